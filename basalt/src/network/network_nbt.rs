use basalt_net::PacketBuffer;
use quartz_nbt::{NbtCompound, NbtList, NbtTag};
use std::io::{Error, ErrorKind, Result};

const TAG_END: u8 = 0x0;
const TAG_COMPOUND: u8 = 0xA;
// Longer strings are rejected by clients
const MAX_STRING_LENGTH: usize = 0x7FFF;

fn tag_id(tag: &NbtTag) -> u8 {
    match tag {
        NbtTag::Byte(_) => 0x1,
        NbtTag::Short(_) => 0x2,
        NbtTag::Int(_) => 0x3,
        NbtTag::Long(_) => 0x4,
        NbtTag::Float(_) => 0x5,
        NbtTag::Double(_) => 0x6,
        NbtTag::ByteArray(_) => 0x7,
        NbtTag::String(_) => 0x8,
        NbtTag::List(_) => 0x9,
        NbtTag::Compound(_) => TAG_COMPOUND,
        NbtTag::IntArray(_) => 0xB,
        NbtTag::LongArray(_) => 0xC,
    }
}

/// Writes the given compound in the little-endian network flavor of NBT sent to clients: string
/// lengths are unsigned varints, and ints, longs and array or list lengths are zig-zag varints.
pub fn write_network_nbt(buffer: &mut PacketBuffer, root_name: &str, root: &NbtCompound) -> Result<()> {
    buffer.write(TAG_COMPOUND);
    write_string(buffer, root_name)?;
    write_compound(buffer, root)
}

fn write_compound(buffer: &mut PacketBuffer, compound: &NbtCompound) -> Result<()> {
    for (name, tag) in compound {
        buffer.write(tag_id(tag));
        write_string(buffer, name)?;
        write_tag_body(buffer, tag)?;
    }

    buffer.write(TAG_END);
    Ok(())
}

fn write_list(buffer: &mut PacketBuffer, list: &NbtList) -> Result<()> {
    let type_id = list.iter().next().map(tag_id).unwrap_or(TAG_END);
    buffer.write(type_id);
    buffer.write_varint(list.len() as i32);

    for tag in list {
        if tag_id(tag) != type_id {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Attempted to write NBT list with a non-homogenous type",
            ));
        }

        write_tag_body(buffer, tag)?;
    }

    Ok(())
}

fn write_tag_body(buffer: &mut PacketBuffer, tag: &NbtTag) -> Result<()> {
    match tag {
        NbtTag::Byte(value) => buffer.write(*value as u8),
        NbtTag::Short(value) => buffer.write_i16_le(*value),
        NbtTag::Int(value) => buffer.write_varint(*value),
        NbtTag::Long(value) => buffer.write_varlong(*value),
        NbtTag::Float(value) => buffer.write_f32_le(*value),
        NbtTag::Double(value) => buffer.write_f64_le(*value),
        NbtTag::ByteArray(value) => {
            buffer.write_varint(value.len() as i32);
            for &byte in value {
                buffer.write(byte as u8);
            }
        }
        NbtTag::String(value) => write_string(buffer, value)?,
        NbtTag::List(value) => write_list(buffer, value)?,
        NbtTag::Compound(value) => write_compound(buffer, value)?,
        NbtTag::IntArray(value) => {
            buffer.write_varint(value.len() as i32);
            for &int in value {
                buffer.write_varint(int);
            }
        }
        NbtTag::LongArray(value) => {
            buffer.write_varint(value.len() as i32);
            for &long in value {
                buffer.write_varlong(long);
            }
        }
    }

    Ok(())
}

fn write_string(buffer: &mut PacketBuffer, string: &str) -> Result<()> {
    if string.len() > MAX_STRING_LENGTH {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("NBT string of {} bytes is too long", string.len()),
        ));
    }

    buffer.write_unsigned_varint(string.len() as u32);
    buffer.write_bytes(string.as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(compound: &NbtCompound) -> Vec<u8> {
        let mut buffer = PacketBuffer::new(32);
        write_network_nbt(&mut buffer, "", compound).expect("Failed to write NBT");
        buffer.into_inner()
    }

    #[test]
    fn ints_are_zigzag_varints() {
        let mut compound = NbtCompound::new();
        compound.insert("z", NbtTag::Int(3));

        assert_eq!(encode(&compound), vec![0x0A, 0x00, 0x03, 0x01, b'z', 0x06, 0x00]);
    }

    #[test]
    fn strings_and_scalars() {
        let mut compound = NbtCompound::new();
        compound.insert("id", NbtTag::String("Sign".to_owned()));
        assert_eq!(encode(&compound), vec![
            0x0A, 0x00, 0x08, 0x02, b'i', b'd', 0x04, b'S', b'i', b'g', b'n', 0x00
        ]);

        let mut compound = NbtCompound::new();
        compound.insert("s", NbtTag::Short(-2));
        assert_eq!(encode(&compound), vec![0x0A, 0x00, 0x02, 0x01, b's', 0xFE, 0xFF, 0x00]);

        let mut compound = NbtCompound::new();
        compound.insert("l", NbtTag::Long(-3));
        assert_eq!(encode(&compound), vec![0x0A, 0x00, 0x04, 0x01, b'l', 0x05, 0x00]);
    }

    #[test]
    fn nested_lists_and_compounds() {
        let mut inner = NbtCompound::new();
        inner.insert("b", NbtTag::Byte(-1));

        let mut compound = NbtCompound::new();
        compound.insert(
            "l",
            NbtTag::List(NbtList::from(vec![NbtTag::Compound(inner)])),
        );

        assert_eq!(encode(&compound), vec![
            0x0A, 0x00, // root
            0x09, 0x01, b'l', 0x0A, 0x02, // list of one compound
            0x01, 0x01, b'b', 0xFF, 0x00, // the compound
            0x00, // end of root
        ]);
    }

    #[test]
    fn arrays_carry_varint_lengths() {
        let mut compound = NbtCompound::new();
        compound.insert("a", NbtTag::IntArray(vec![1, -1]));
        assert_eq!(encode(&compound), vec![0x0A, 0x00, 0x0B, 0x01, b'a', 0x04, 0x02, 0x01, 0x00]);

        let mut compound = NbtCompound::new();
        compound.insert("e", NbtTag::List(NbtList::new()));
        assert_eq!(encode(&compound), vec![0x0A, 0x00, 0x09, 0x01, b'e', 0x00, 0x00, 0x00]);
    }

    #[test]
    fn mixed_lists_are_rejected() {
        let mut compound = NbtCompound::new();
        compound.insert(
            "l",
            NbtTag::List(NbtList::from(vec![NbtTag::Byte(1), NbtTag::Int(1)])),
        );

        let mut buffer = PacketBuffer::new(16);
        assert!(write_network_nbt(&mut buffer, "", &compound).is_err());
    }
}
