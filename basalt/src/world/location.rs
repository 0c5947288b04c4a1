use std::{
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
};

/// The number of bits a block coordinate is shifted by to obtain its chunk coordinate.
pub const CHUNK_COORD_BIT_SIZE: u32 = 4;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPosition {
    pub x: i32,
    pub y: i16,
    pub z: i32,
}

impl BlockPosition {
    pub const fn new(x: i32, y: i16, z: i32) -> Self {
        BlockPosition { x, y, z }
    }

    /// Returns the coordinates of the chunk column containing this block.
    pub const fn chunk(&self) -> ChunkCoords {
        ChunkCoords::new(
            self.x >> CHUNK_COORD_BIT_SIZE,
            self.z >> CHUNK_COORD_BIT_SIZE,
        )
    }
}

impl Display for BlockPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "x: {}, y: {}, z: {}", self.x, self.y, self.z)
    }
}

impl Debug for BlockPosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// The coordinates of a chunk column.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ChunkCoords {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoords {
    pub const fn new(x: i32, z: i32) -> Self {
        ChunkCoords { x, z }
    }

    /// Packs both coordinates into a single key, `x` in the upper 32 bits.
    pub const fn chunk_hash(&self) -> i64 {
        ((self.x as u32 as i64) << 32) | (self.z as u32 as i64)
    }

    /// The inverse of [`chunk_hash`](ChunkCoords::chunk_hash).
    pub const fn from_chunk_hash(hash: i64) -> Self {
        ChunkCoords::new((hash >> 32) as i32, hash as i32)
    }
}

impl Display for ChunkCoords {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "x: {}, z: {}", self.x, self.z)
    }
}

impl Debug for ChunkCoords {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "C({}, {})", self.x, self.z)
    }
}

impl Hash for ChunkCoords {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_i64(self.chunk_hash());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_hash_round_trips_negative_coordinates() {
        for coords in [
            ChunkCoords::new(0, 0),
            ChunkCoords::new(-1, 5),
            ChunkCoords::new(i32::MIN, i32::MAX),
        ] {
            assert_eq!(ChunkCoords::from_chunk_hash(coords.chunk_hash()), coords);
        }

        assert_ne!(
            ChunkCoords::new(1, 0).chunk_hash(),
            ChunkCoords::new(0, 1).chunk_hash()
        );
    }

    #[test]
    fn block_to_chunk() {
        assert_eq!(BlockPosition::new(17, 64, -1).chunk(), ChunkCoords::new(1, -1));
        assert_eq!(BlockPosition::new(-16, 0, 15).chunk(), ChunkCoords::new(-1, 0));
    }
}
