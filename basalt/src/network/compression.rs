use flate2::{write::DeflateEncoder, Compression};
use std::{
    fmt::{self, Display, Formatter},
    io::{self, Write},
};

/// Identifies a compression scheme. Packets compressed by different compressors are cached
/// separately.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompressorId(pub u32);

impl Display for CompressorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "compressor#{}", self.0)
    }
}

/// Compresses framed packet batches before they are sent.
pub trait Compressor: Send + Sync {
    fn id(&self) -> CompressorId;

    fn compress(&self, payload: &[u8]) -> io::Result<Vec<u8>>;
}

/// The default compression level of batches.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 7;

/// Compresses batches into a raw deflate stream, without zlib header or checksum.
#[derive(Clone, Copy, Debug)]
pub struct ZlibCompressor {
    id: CompressorId,
    level: Compression,
}

impl ZlibCompressor {
    /// Creates a compressor with the given id and level. Levels above 9 are clamped.
    pub fn new(id: CompressorId, level: u32) -> Self {
        ZlibCompressor {
            id,
            level: Compression::new(level.min(9)),
        }
    }

    pub fn level(&self) -> u32 {
        self.level.level()
    }
}

impl Default for ZlibCompressor {
    fn default() -> Self {
        ZlibCompressor::new(CompressorId(0), DEFAULT_COMPRESSION_LEVEL)
    }
}

impl Compressor for ZlibCompressor {
    fn id(&self) -> CompressorId {
        self.id
    }

    fn compress(&self, payload: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::with_capacity(payload.len() / 2), self.level);
        encoder.write_all(payload)?;
        encoder.finish()
    }
}
