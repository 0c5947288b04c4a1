use crate::{
    network::{mapping::RuntimeBlockMapping, network_nbt::write_network_nbt},
    world::chunk::{Chunk, PalettedBlockArray, SubChunk, MAX_SUBCHUNK_INDEX, MIN_SUBCHUNK_INDEX},
};
use basalt_net::{protocol::SUB_CHUNK_VERSION, EncodingParams, PacketBuffer, ProtocolVariant};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io,
};

/// Returns the number of sub-chunks sent for the given chunk. Sub-chunks are sent as a stack, so
/// every sub-chunk below the highest non-empty one is sent as well.
pub fn sub_chunk_count(chunk: &Chunk) -> u32 {
    (MIN_SUBCHUNK_INDEX ..= MAX_SUBCHUNK_INDEX)
        .rev()
        .find(|&y| chunk.sub_chunk(y).map(|sub| !sub.is_empty()).unwrap_or(false))
        .map(|y| (y - MIN_SUBCHUNK_INDEX + 1) as u32)
        .unwrap_or(0)
}

/// Encodes a whole chunk column for the given variant. If `tiles` is given it is sent in place of
/// the chunk's own block entities.
pub fn serialize_full_chunk(
    chunk: &Chunk,
    mapping: &dyn RuntimeBlockMapping,
    variant: ProtocolVariant,
    tiles: Option<&[u8]>,
) -> Result<Vec<u8>, ChunkSerializeError> {
    let params = variant.encoding_params();
    let mut buffer = PacketBuffer::new(4096);

    let count = sub_chunk_count(chunk) as i32;
    for y in MIN_SUBCHUNK_INDEX .. MIN_SUBCHUNK_INDEX + count {
        if let Some(sub_chunk) = chunk.sub_chunk(y) {
            serialize_sub_chunk(sub_chunk, mapping, variant, params, &mut buffer)?;
        }
    }

    buffer.write_bytes(chunk.biome_ids());
    // Border blocks, never sent
    buffer.write(0);

    match tiles {
        Some(tiles) => buffer.write_bytes(tiles),
        None => buffer.write_bytes(&serialize_tiles(chunk)?),
    }

    Ok(buffer.into_inner())
}

/// Encodes one sub-chunk and its block layers.
pub fn serialize_sub_chunk(
    sub_chunk: &SubChunk,
    mapping: &dyn RuntimeBlockMapping,
    variant: ProtocolVariant,
    params: EncodingParams,
    buffer: &mut PacketBuffer,
) -> Result<(), ChunkSerializeError> {
    buffer.write(SUB_CHUNK_VERSION);
    buffer.write(sub_chunk.layers().len() as u8);

    for layer in sub_chunk.layers() {
        serialize_layer(layer, mapping, variant, params, buffer)?;
    }

    Ok(())
}

fn serialize_layer(
    layer: &PalettedBlockArray,
    mapping: &dyn RuntimeBlockMapping,
    variant: ProtocolVariant,
    params: EncodingParams,
    buffer: &mut PacketBuffer,
) -> Result<(), ChunkSerializeError> {
    let persistent_flag = if params.persistent_block_states { 0 } else { 1 };
    let mut bits_per_block = layer.bits_per_block();

    if bits_per_block == 0 && params.polyfill_zero_bits_per_block {
        bits_per_block = 1;
        buffer.write((bits_per_block << 1) | persistent_flag);
        buffer.write_zeros(PalettedBlockArray::expected_word_array_size(1) * 4);
    } else {
        buffer.write((bits_per_block << 1) | persistent_flag);
        buffer.write_u32_words_le(layer.words());
    }

    let palette = layer.palette();
    if bits_per_block != 0 {
        buffer.write_unsigned_varint((palette.len() as u32) << 1);
    }

    for &state in palette {
        let runtime_id = mapping.to_runtime_id(state, variant);

        if params.persistent_block_states {
            let known_state = mapping.known_state(runtime_id, variant).ok_or(
                ChunkSerializeError::UnknownRuntimeId {
                    runtime_id,
                    variant,
                },
            )?;
            write_network_nbt(buffer, "", known_state)?;
        } else {
            buffer.write_unsigned_varint(runtime_id << 1);
        }
    }

    Ok(())
}

/// Encodes the spawn compound of every block entity in the chunk which has one.
pub fn serialize_tiles(chunk: &Chunk) -> Result<Vec<u8>, ChunkSerializeError> {
    let mut tiles = PacketBuffer::new(64);

    for compound in chunk.tiles().iter().filter_map(|tile| tile.spawn_compound()) {
        write_network_nbt(&mut tiles, "", &compound)?;
    }

    Ok(tiles.into_inner())
}

#[derive(Debug)]
pub enum ChunkSerializeError {
    Nbt(io::Error),
    UnknownRuntimeId {
        runtime_id: u32,
        variant: ProtocolVariant,
    },
}

impl Display for ChunkSerializeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ChunkSerializeError::Nbt(error) => Display::fmt(error, f),
            ChunkSerializeError::UnknownRuntimeId {
                runtime_id,
                variant,
            } => write!(
                f,
                "No known block state for runtime id {} in {}",
                runtime_id, variant
            ),
        }
    }
}

impl Error for ChunkSerializeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ChunkSerializeError::Nbt(error) => Some(error),
            _ => None,
        }
    }
}

impl From<io::Error> for ChunkSerializeError {
    fn from(x: io::Error) -> Self {
        ChunkSerializeError::Nbt(x)
    }
}
