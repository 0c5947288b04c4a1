use std::hash::{BuildHasher, Hasher};

/// The purpose of this hasher is to be extremely fast for hashing primitive integer types containing
/// less than or equal to 64 bits, such as packed chunk coordinates and protocol numbers. This hasher
/// should not be used in any other context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NumHasher;

impl BuildHasher for NumHasher {
    type Hasher = NumHashIsomorphism;

    fn build_hasher(&self) -> Self::Hasher {
        NumHashIsomorphism { state: 0 }
    }
}

/// Treats values of the primitive integer types as their own hash, hence the hash isomorphism. For
/// all other input, the bytes are xor-ed into the internal state in 64-bit chunks.
pub struct NumHashIsomorphism {
    state: u64,
}

impl Hasher for NumHashIsomorphism {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(8) {
            let mut buf = [0u8; 8];
            buf[.. chunk.len()].copy_from_slice(chunk);
            self.state ^= u64::from_le_bytes(buf);
        }
    }

    fn write_u8(&mut self, i: u8) {
        self.state = i as u64;
    }

    fn write_u16(&mut self, i: u16) {
        self.state = i as u64;
    }

    fn write_i32(&mut self, i: i32) {
        self.state = i as u32 as u64;
    }

    fn write_u32(&mut self, i: u32) {
        self.state = i as u64;
    }

    fn write_i64(&mut self, i: i64) {
        self.state = i as u64;
    }

    fn write_u64(&mut self, i: u64) {
        self.state = i;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn integers_hash_to_themselves() {
        let mut hasher = NumHasher.build_hasher();
        hasher.write_i64(-2);
        assert_eq!(hasher.finish(), u64::MAX - 1);

        let mut hasher = NumHasher.build_hasher();
        hasher.write_u32(440);
        assert_eq!(hasher.finish(), 440);
    }

    #[test]
    fn usable_as_map_hasher() {
        let mut map = HashMap::with_hasher(NumHasher);
        map.insert(1i64 << 32 | 7, "a");
        map.insert(-1i64, "b");
        assert_eq!(map.get(&(1i64 << 32 | 7)), Some(&"a"));
        assert_eq!(map.get(&-1i64), Some(&"b"));
    }
}
