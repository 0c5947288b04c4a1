use crate::world::location::{BlockPosition, ChunkCoords};
use std::fmt::{self, Display, Formatter};

/// Identifies a chunk listener registered with a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

impl Display for ListenerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// A mutation of a loaded chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkEvent {
    /// The chunk was replaced or changed in bulk.
    ChunkChanged(ChunkCoords),
    /// A single block was set.
    BlockChanged(BlockPosition),
    /// The chunk was unloaded from its world.
    ChunkUnloaded(ChunkCoords),
}

impl ChunkEvent {
    /// Returns the coordinates of the chunk this event applies to.
    pub fn coords(&self) -> ChunkCoords {
        match self {
            ChunkEvent::ChunkChanged(coords) | ChunkEvent::ChunkUnloaded(coords) => *coords,
            ChunkEvent::BlockChanged(pos) => pos.chunk(),
        }
    }
}

/// Receives mutation events for the chunks it was registered at. Every reaction defaults to doing
/// nothing.
pub trait ChunkListener {
    fn on_chunk_changed(&mut self, _coords: ChunkCoords) {}

    fn on_block_changed(&mut self, _pos: BlockPosition) {}

    fn on_chunk_unloaded(&mut self, _coords: ChunkCoords) {}

    /// Routes the event to the matching reaction.
    fn handle_event(&mut self, event: ChunkEvent) {
        match event {
            ChunkEvent::ChunkChanged(coords) => self.on_chunk_changed(coords),
            ChunkEvent::BlockChanged(pos) => self.on_block_changed(pos),
            ChunkEvent::ChunkUnloaded(coords) => self.on_chunk_unloaded(coords),
        }
    }
}
