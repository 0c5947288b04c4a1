use quartz_nbt::{io::NbtIoError, NbtReprError};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io::Error as IoError,
};

/// Raised when saved chunk data cannot be decoded. Every variant means the data is corrupted and
/// the chunk cannot be loaded.
#[derive(Debug)]
pub enum ChunkDecodeError {
    Decompression(IoError),
    Nbt(NbtIoError),
    NbtRepr(NbtReprError),
    MissingTag(&'static str),
    InvalidLength {
        tag: &'static str,
        expected: usize,
        actual: usize,
    },
    InvalidListEntry {
        list: &'static str,
        index: usize,
    },
    InvalidSection {
        y: i8,
        source: Box<dyn Error + Send + Sync>,
    },
}

impl Display for ChunkDecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Corrupted chunk data: ")?;

        match self {
            ChunkDecodeError::Decompression(error) => write!(f, "failed to decompress: {}", error),
            ChunkDecodeError::Nbt(error) => Display::fmt(error, f),
            ChunkDecodeError::NbtRepr(error) => Display::fmt(error, f),
            ChunkDecodeError::MissingTag(tag) => write!(f, "missing tag \"{}\"", tag),
            ChunkDecodeError::InvalidLength {
                tag,
                expected,
                actual,
            } => write!(
                f,
                "expected \"{}\" to have {} entries, found {}",
                tag, expected, actual
            ),
            ChunkDecodeError::InvalidListEntry { list, index } =>
                write!(f, "entry {} of \"{}\" is not a compound", index, list),
            ChunkDecodeError::InvalidSection { y, source } =>
                write!(f, "invalid section at Y={}: {}", y, source),
        }
    }
}

impl Error for ChunkDecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ChunkDecodeError::Decompression(error) => Some(error),
            ChunkDecodeError::Nbt(error) => Some(error),
            ChunkDecodeError::NbtRepr(error) => Some(error),
            ChunkDecodeError::InvalidSection { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<NbtIoError> for ChunkDecodeError {
    fn from(x: NbtIoError) -> Self {
        ChunkDecodeError::Nbt(x)
    }
}

impl From<NbtReprError> for ChunkDecodeError {
    fn from(x: NbtReprError) -> Self {
        ChunkDecodeError::NbtRepr(x)
    }
}

impl ChunkDecodeError {
    /// Wraps an error raised while reading the section at the given Y index.
    pub fn section<E>(y: i8, error: E) -> Self
    where E: Into<Box<dyn Error + Send + Sync>> {
        ChunkDecodeError::InvalidSection {
            y,
            source: error.into(),
        }
    }
}
