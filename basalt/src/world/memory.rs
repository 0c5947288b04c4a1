use crate::world::{chunk::Chunk, location::ChunkCoords, ListenerId, World, WorldId};
use basalt_util::hash::NumHasher;
use parking_lot::{Mutex, RwLock};
use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

/// A chunk removed from a world along with the listeners that were registered at it. Each of them
/// is owed a [`ChunkEvent::ChunkUnloaded`](crate::world::ChunkEvent::ChunkUnloaded).
#[derive(Debug)]
pub struct UnloadedChunk {
    pub chunk: Arc<Chunk>,
    pub listeners: Vec<ListenerId>,
}

/// A world holding every loaded chunk in memory.
pub struct MemoryWorld {
    id: WorldId,
    chunks: RwLock<HashMap<ChunkCoords, Arc<Chunk>, NumHasher>>,
    listeners: Mutex<HashMap<ChunkCoords, BTreeSet<ListenerId>, NumHasher>>,
}

impl MemoryWorld {
    pub fn new(id: WorldId) -> Self {
        MemoryWorld {
            id,
            chunks: RwLock::new(HashMap::with_hasher(NumHasher)),
            listeners: Mutex::new(HashMap::with_hasher(NumHasher)),
        }
    }

    /// Loads the given chunk, replacing and returning any chunk previously loaded at its
    /// coordinates.
    pub fn set_chunk(&self, chunk: Chunk) -> Option<Arc<Chunk>> {
        self.chunks.write().insert(chunk.coords(), Arc::new(chunk))
    }

    /// Unloads the chunk at the given coordinates. The listeners registered there are released
    /// and returned so the host can notify them. Nothing changes if no chunk was loaded.
    pub fn remove_chunk(&self, coords: ChunkCoords) -> Option<UnloadedChunk> {
        let chunk = self.chunks.write().remove(&coords)?;
        let listeners = self
            .listeners
            .lock()
            .remove(&coords)
            .map(|listeners| listeners.into_iter().collect())
            .unwrap_or_default();

        Some(UnloadedChunk { chunk, listeners })
    }

    pub fn loaded_chunk_count(&self) -> usize {
        self.chunks.read().len()
    }
}

impl World for MemoryWorld {
    fn id(&self) -> WorldId {
        self.id
    }

    fn chunk(&self, coords: ChunkCoords) -> Option<Arc<Chunk>> {
        self.chunks.read().get(&coords).cloned()
    }

    fn register_chunk_listener(&self, listener: ListenerId, coords: ChunkCoords) {
        self.listeners
            .lock()
            .entry(coords)
            .or_default()
            .insert(listener);
    }

    fn unregister_chunk_listener(&self, listener: ListenerId, coords: ChunkCoords) {
        let mut listeners = self.listeners.lock();

        if let Some(set) = listeners.get_mut(&coords) {
            set.remove(&listener);
            if set.is_empty() {
                listeners.remove(&coords);
            }
        }
    }

    /// Returns the listeners in ascending order.
    fn chunk_listeners(&self, coords: ChunkCoords) -> Vec<ListenerId> {
        self.listeners
            .lock()
            .get(&coords)
            .map(|listeners| listeners.iter().copied().collect())
            .unwrap_or_default()
    }

    fn is_chunk_listener(&self, listener: ListenerId, coords: ChunkCoords) -> bool {
        self.listeners
            .lock()
            .get(&coords)
            .map(|listeners| listeners.contains(&listener))
            .unwrap_or(false)
    }
}
