use crate::world::{
    chunk::{
        Chunk,
        ChunkDecodeError,
        PalettedBlockArray,
        StoredBlockEntity,
        SubChunk,
        AIR_STATE,
        BIOME_ARRAY_SIZE,
        BLOCKS_PER_LAYER,
        DEFAULT_BIOME_ID,
    },
    location::ChunkCoords,
};
use flate2::read::{GzDecoder, ZlibDecoder};
use log::warn;
use quartz_nbt::{io::Flavor, NbtCompound, NbtList, NbtTag};
use std::io::{self, Cursor, Read};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Reads one entry of a legacy chunk's "Sections" list. Each legacy format stores its sections
/// differently, while the surrounding chunk layout is shared.
pub trait LegacySectionReader {
    fn read_section(&self, section: &NbtCompound) -> Result<SubChunk, ChunkDecodeError>;
}

/// The result of decoding a legacy chunk: the terrain plus the raw entity and block entity records.
#[derive(Debug)]
pub struct ChunkData {
    pub chunk: Chunk,
    pub entities: Vec<NbtCompound>,
    pub tiles: Vec<NbtCompound>,
}

impl ChunkData {
    /// Attaches every tile record carrying a position to the chunk as a block entity, and returns
    /// the chunk. Entity records are discarded.
    pub fn into_chunk(self) -> Chunk {
        let mut chunk = self.chunk;

        for record in self.tiles {
            match StoredBlockEntity::from_record(record) {
                Some(tile) => chunk.add_tile(Box::new(tile)),
                None => warn!("Dropping block entity without a position in chunk {}", chunk.coords()),
            }
        }

        chunk
    }
}

/// Decodes chunks saved in the legacy Anvil family of formats.
pub struct LegacyAnvilDecoder<R> {
    section_reader: R,
}

impl<R: LegacySectionReader> LegacyAnvilDecoder<R> {
    pub fn new(section_reader: R) -> Self {
        LegacyAnvilDecoder { section_reader }
    }

    /// Decodes the compressed chunk at the given coordinates.
    pub fn decode(&self, coords: ChunkCoords, data: &[u8]) -> Result<ChunkData, ChunkDecodeError> {
        let decompressed = decompress(data).map_err(ChunkDecodeError::Decompression)?;
        let (root, _) =
            quartz_nbt::io::read_nbt(&mut Cursor::new(&decompressed), Flavor::Uncompressed)?;

        let level = root
            .get::<_, &NbtCompound>("Level")
            .map_err(|_| ChunkDecodeError::MissingTag("Level"))?;

        let mut chunk = Chunk::new(coords);

        if let Ok(sections) = level.get::<_, &NbtList>("Sections") {
            for tag in sections.iter() {
                let section = match tag {
                    NbtTag::Compound(section) => section,
                    _ => continue,
                };

                let y = section.get::<_, i8>("Y")?;
                let sub_chunk = self.section_reader.read_section(section)?;
                if !chunk.set_sub_chunk(y as i32, sub_chunk) {
                    warn!("Ignoring out of range section Y={} in chunk {}", y, coords);
                }
            }
        }

        chunk.set_biome_ids(read_biomes(level)?);
        chunk.set_populated(
            level
                .get::<_, i8>("TerrainPopulated")
                .map(|populated| populated != 0)
                .unwrap_or(false),
        );

        Ok(ChunkData {
            chunk,
            entities: read_compound_list(level, "Entities")?,
            tiles: read_compound_list(level, "TileEntities")?,
        })
    }
}

fn decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decompressed = Vec::with_capacity(data.len() * 4);

    if data.starts_with(&GZIP_MAGIC) {
        GzDecoder::new(data).read_to_end(&mut decompressed)?;
    } else {
        ZlibDecoder::new(data).read_to_end(&mut decompressed)?;
    }

    Ok(decompressed)
}

// BiomeColors takes precedence over Biomes, and either must hold exactly one entry per column
fn read_biomes(level: &NbtCompound) -> Result<[u8; BIOME_ARRAY_SIZE], ChunkDecodeError> {
    let mut biome_ids = [DEFAULT_BIOME_ID; BIOME_ARRAY_SIZE];

    if let Ok(colors) = level.get::<_, &[i32]>("BiomeColors") {
        check_length("BiomeColors", colors.len(), BIOME_ARRAY_SIZE)?;
        for (id, &color) in biome_ids.iter_mut().zip(colors) {
            *id = ((color >> 24) & 0xff) as u8;
        }
    } else if let Ok(biomes) = level.get::<_, &[i8]>("Biomes") {
        check_length("Biomes", biomes.len(), BIOME_ARRAY_SIZE)?;
        for (id, &biome) in biome_ids.iter_mut().zip(biomes) {
            *id = biome as u8;
        }
    }

    Ok(biome_ids)
}

fn read_compound_list(
    level: &NbtCompound,
    list: &'static str,
) -> Result<Vec<NbtCompound>, ChunkDecodeError> {
    let entries = match level.get::<_, &NbtList>(list) {
        Ok(entries) => entries,
        Err(_) => return Ok(Vec::new()),
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, tag)| match tag {
            NbtTag::Compound(compound) => Ok(compound.clone()),
            _ => Err(ChunkDecodeError::InvalidListEntry { list, index }),
        })
        .collect()
}

fn check_length(tag: &'static str, actual: usize, expected: usize) -> Result<(), ChunkDecodeError> {
    if actual == expected {
        Ok(())
    } else {
        Err(ChunkDecodeError::InvalidLength {
            tag,
            expected,
            actual,
        })
    }
}

/// Reads sections in the layout written by PocketMine's PMAnvil format: a 4096 byte "Blocks" array
/// and a 2048 byte nibble "Data" array, both in XZY order. Block states are `id << 4 | meta`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PmAnvilSectionReader;

impl LegacySectionReader for PmAnvilSectionReader {
    fn read_section(&self, section: &NbtCompound) -> Result<SubChunk, ChunkDecodeError> {
        read_id_meta_section(section, |x, y, z| (x << 8) | (z << 4) | y)
    }
}

/// Reads sections in the layout of the original Anvil format, which matches PMAnvil except that
/// "Blocks" and "Data" are stored in YZX order.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnvilSectionReader;

impl LegacySectionReader for AnvilSectionReader {
    fn read_section(&self, section: &NbtCompound) -> Result<SubChunk, ChunkDecodeError> {
        read_id_meta_section(section, |x, y, z| (y << 8) | (z << 4) | x)
    }
}

// `index` maps a position to its offset in the stored arrays
fn read_id_meta_section<F>(section: &NbtCompound, index: F) -> Result<SubChunk, ChunkDecodeError>
where F: Fn(usize, usize, usize) -> usize {
    let section_y = section.get::<_, i8>("Y")?;
    let blocks = section
        .get::<_, &[i8]>("Blocks")
        .map_err(|_| ChunkDecodeError::MissingTag("Blocks"))?;
    let data = section
        .get::<_, &[i8]>("Data")
        .map_err(|_| ChunkDecodeError::MissingTag("Data"))?;

    check_length("Blocks", blocks.len(), BLOCKS_PER_LAYER)
        .map_err(|error| ChunkDecodeError::section(section_y, error.to_string()))?;
    check_length("Data", data.len(), BLOCKS_PER_LAYER / 2)
        .map_err(|error| ChunkDecodeError::section(section_y, error.to_string()))?;

    let mut states = [AIR_STATE; BLOCKS_PER_LAYER];
    for x in 0 .. 16 {
        for z in 0 .. 16 {
            for y in 0 .. 16 {
                let offset = index(x, y, z);
                let nibbles = data[offset >> 1] as u8;
                let meta = if offset & 1 == 0 {
                    nibbles & 0xF
                } else {
                    nibbles >> 4
                };

                states[(x << 8) | (z << 4) | y] = ((blocks[offset] as u8 as u32) << 4) | meta as u32;
            }
        }
    }

    Ok(SubChunk::new(AIR_STATE, vec![
        PalettedBlockArray::from_states(&states),
    ]))
}
