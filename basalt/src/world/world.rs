use crate::world::{chunk::Chunk, location::ChunkCoords, ListenerId};
use std::{
    fmt::{self, Display, Formatter},
    sync::Arc,
};

/// Identifies a loaded world for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorldId(pub u32);

impl Display for WorldId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "world#{}", self.0)
    }
}

/// The view of a world needed to build and invalidate chunk packets.
///
/// Chunks are handed out as shared snapshots so they can be encoded off of the owning thread. A
/// world must keep a listener registration until it is explicitly removed or the chunk unloads, and
/// must hand the registrations of an unloaded chunk back to its host so they can be notified.
pub trait World: Send + Sync {
    fn id(&self) -> WorldId;

    /// Returns the chunk at the given coordinates, or `None` if it is not loaded.
    fn chunk(&self, coords: ChunkCoords) -> Option<Arc<Chunk>>;

    fn register_chunk_listener(&self, listener: ListenerId, coords: ChunkCoords);

    fn unregister_chunk_listener(&self, listener: ListenerId, coords: ChunkCoords);

    /// Returns the listeners registered at the given coordinates. Mutation events of that chunk are
    /// delivered to these listeners only.
    fn chunk_listeners(&self, coords: ChunkCoords) -> Vec<ListenerId>;

    fn is_chunk_listener(&self, listener: ListenerId, coords: ChunkCoords) -> bool {
        self.chunk_listeners(coords).contains(&listener)
    }
}
