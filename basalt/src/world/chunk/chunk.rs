use crate::world::{
    chunk::PalettedBlockArray,
    location::{BlockPosition, ChunkCoords},
};
use quartz_nbt::NbtCompound;
use std::fmt::Debug;

/// The lowest sub-chunk index of a chunk column.
pub const MIN_SUBCHUNK_INDEX: i32 = 0;
/// The highest sub-chunk index of a chunk column.
pub const MAX_SUBCHUNK_INDEX: i32 = 15;
/// The number of sub-chunks stacked in a chunk column.
pub const SUBCHUNK_COUNT: usize = (MAX_SUBCHUNK_INDEX - MIN_SUBCHUNK_INDEX + 1) as usize;
/// The length of a chunk's biome array, one entry per column.
pub const BIOME_ARRAY_SIZE: usize = 256;
/// Biome id used when a chunk carries no biome data (ocean).
pub const DEFAULT_BIOME_ID: u8 = 0;
/// Block state of air, the empty block of every sub-chunk by default.
pub const AIR_STATE: u32 = 0;

/// A block entity living in a chunk.
pub trait BlockEntity: Debug + Send + Sync {
    /// Returns the position of this block entity.
    fn position(&self) -> BlockPosition;

    /// Returns the compound sent to clients when this block entity is spawned, or `None` if this
    /// block entity has no network representation.
    fn spawn_compound(&self) -> Option<NbtCompound>;
}

/// A block entity backed directly by its saved record. Every such block entity is sent to clients
/// as the record itself.
#[derive(Debug, Clone)]
pub struct StoredBlockEntity {
    position: BlockPosition,
    record: NbtCompound,
}

impl StoredBlockEntity {
    /// Creates a block entity from a saved record, or returns `None` if the record does not carry
    /// integer `x`, `y` and `z` tags.
    pub fn from_record(record: NbtCompound) -> Option<Self> {
        let x = record.get::<_, i32>("x").ok()?;
        let y = record.get::<_, i32>("y").ok()?;
        let z = record.get::<_, i32>("z").ok()?;

        Some(StoredBlockEntity {
            position: BlockPosition::new(x, y as i16, z),
            record,
        })
    }
}

impl BlockEntity for StoredBlockEntity {
    fn position(&self) -> BlockPosition {
        self.position
    }

    fn spawn_compound(&self) -> Option<NbtCompound> {
        Some(self.record.clone())
    }
}

/// A 16x16x16 cube of blocks, made of one or more overlaid block layers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubChunk {
    empty_block: u32,
    layers: Vec<PalettedBlockArray>,
}

impl SubChunk {
    pub fn new(empty_block: u32, layers: Vec<PalettedBlockArray>) -> Self {
        SubChunk {
            empty_block,
            layers,
        }
    }

    /// Creates a sub-chunk with no layers.
    pub fn empty(empty_block: u32) -> Self {
        Self::new(empty_block, Vec::new())
    }

    #[inline]
    pub fn empty_block(&self) -> u32 {
        self.empty_block
    }

    #[inline]
    pub fn layers(&self) -> &[PalettedBlockArray] {
        &self.layers
    }

    /// Returns whether this sub-chunk has no layers, or only layers filled with the empty block.
    pub fn is_empty(&self) -> bool {
        self.layers
            .iter()
            .all(|layer| layer.is_uniform(self.empty_block))
    }

    /// Returns the block state of the first layer at the given local coordinates.
    pub fn block_state(&self, x: usize, y: usize, z: usize) -> u32 {
        self.layers
            .first()
            .map(|layer| layer.get(x, y, z))
            .unwrap_or(self.empty_block)
    }
}

#[derive(Debug)]
pub struct Chunk {
    coords: ChunkCoords,
    sub_chunks: Vec<SubChunk>,
    biome_ids: [u8; BIOME_ARRAY_SIZE],
    tiles: Vec<Box<dyn BlockEntity>>,
    populated: bool,
}

impl Chunk {
    /// Creates a chunk of air with the default biome.
    pub fn new(coords: ChunkCoords) -> Self {
        Chunk {
            coords,
            sub_chunks: vec![SubChunk::empty(AIR_STATE); SUBCHUNK_COUNT],
            biome_ids: [DEFAULT_BIOME_ID; BIOME_ARRAY_SIZE],
            tiles: Vec::new(),
            populated: false,
        }
    }

    #[inline]
    pub fn coords(&self) -> ChunkCoords {
        self.coords
    }

    /// Returns the sub-chunk at the given index, or `None` if the index is out of range.
    pub fn sub_chunk(&self, index: i32) -> Option<&SubChunk> {
        Self::slot(index).and_then(|slot| self.sub_chunks.get(slot))
    }

    /// Replaces the sub-chunk at the given index. Returns `false` and leaves the chunk untouched if
    /// the index is out of range.
    pub fn set_sub_chunk(&mut self, index: i32, sub_chunk: SubChunk) -> bool {
        match Self::slot(index).and_then(|slot| self.sub_chunks.get_mut(slot)) {
            Some(entry) => {
                *entry = sub_chunk;
                true
            }
            None => false,
        }
    }

    fn slot(index: i32) -> Option<usize> {
        if (MIN_SUBCHUNK_INDEX ..= MAX_SUBCHUNK_INDEX).contains(&index) {
            Some((index - MIN_SUBCHUNK_INDEX) as usize)
        } else {
            None
        }
    }

    /// Returns the block state at the given position, which need not lie inside this chunk
    /// horizontally; only the low four bits of `x` and `z` are used.
    pub fn block_state(&self, pos: BlockPosition) -> u32 {
        let y = pos.y as i32;
        match self.sub_chunk(y >> 4) {
            Some(sub_chunk) => sub_chunk.block_state(
                (pos.x & 0xF) as usize,
                (y & 0xF) as usize,
                (pos.z & 0xF) as usize,
            ),
            None => AIR_STATE,
        }
    }

    #[inline]
    pub fn biome_ids(&self) -> &[u8; BIOME_ARRAY_SIZE] {
        &self.biome_ids
    }

    pub fn set_biome_ids(&mut self, biome_ids: [u8; BIOME_ARRAY_SIZE]) {
        self.biome_ids = biome_ids;
    }

    /// Returns the biome of the column at the given local coordinates.
    pub fn biome_id(&self, x: usize, z: usize) -> u8 {
        self.biome_ids[((z & 0xF) << 4) | (x & 0xF)]
    }

    #[inline]
    pub fn tiles(&self) -> &[Box<dyn BlockEntity>] {
        &self.tiles
    }

    pub fn add_tile(&mut self, tile: Box<dyn BlockEntity>) {
        self.tiles.push(tile);
    }

    #[inline]
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    pub fn set_populated(&mut self, populated: bool) {
        self.populated = populated;
    }
}
