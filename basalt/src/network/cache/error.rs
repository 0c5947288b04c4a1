use crate::world::location::ChunkCoords;
use basalt_net::ProtocolVariant;
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// A request the cache refuses to carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// The chunk is not loaded in the cache's world.
    ChunkNotLoaded(ChunkCoords),
    /// There is no pending request to restart at the given key.
    RestartResolved {
        coords: ChunkCoords,
        variant: ProtocolVariant,
    },
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::ChunkNotLoaded(coords) =>
                write!(f, "Chunk {} {} is not loaded", coords.x, coords.z),
            CacheError::RestartResolved { coords, variant } => write!(
                f,
                "Only unresolved requests can be restarted, chunk {} {} for {} has none",
                coords.x, coords.z, variant
            ),
        }
    }
}

impl Error for CacheError {}
