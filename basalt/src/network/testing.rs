use crate::{
    network::{
        compression::{Compressor, CompressorId, ZlibCompressor},
        pool::WorkerPool,
        task::ChunkRequestTask,
    },
    world::{
        chunk::{Chunk, PalettedBlockArray, SubChunk, AIR_STATE},
        location::ChunkCoords,
        MemoryWorld,
        WorldId,
    },
};
use parking_lot::Mutex;
use std::{
    io,
    mem,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// Queues tasks until they are run explicitly.
#[derive(Default)]
pub struct DeferredPool {
    tasks: Mutex<Vec<ChunkRequestTask>>,
}

impl DeferredPool {
    pub fn queued(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Runs every queued task in submission order, ignoring failures.
    pub fn run_all(&self) -> usize {
        let tasks = mem::take(&mut *self.tasks.lock());
        let count = tasks.len();

        for task in tasks {
            drop(task.run());
        }

        count
    }
}

impl WorkerPool for DeferredPool {
    fn submit(&self, task: ChunkRequestTask) {
        self.tasks.lock().push(task);
    }
}

/// Fails the given number of compressions before behaving like the default compressor.
pub struct FlakyCompressor {
    failures: AtomicUsize,
    inner: ZlibCompressor,
}

impl FlakyCompressor {
    pub fn failing(failures: usize) -> Self {
        FlakyCompressor {
            failures: AtomicUsize::new(failures),
            inner: ZlibCompressor::default(),
        }
    }
}

impl Compressor for FlakyCompressor {
    fn id(&self) -> CompressorId {
        CompressorId(1)
    }

    fn compress(&self, payload: &[u8]) -> io::Result<Vec<u8>> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(io::Error::new(io::ErrorKind::Other, "Simulated failure"));
        }

        self.inner.compress(payload)
    }
}

/// Creates a world with a loaded chunk at each of the given coordinates, each holding one layer of
/// stone at the bottom.
pub fn stone_world(coords: &[ChunkCoords]) -> Arc<MemoryWorld> {
    let world = MemoryWorld::new(WorldId(0));

    for &coords in coords {
        let mut chunk = Chunk::new(coords);
        chunk.set_sub_chunk(
            0,
            SubChunk::new(AIR_STATE, vec![PalettedBlockArray::fill(1 << 4)]),
        );
        world.set_chunk(chunk);
    }

    Arc::new(world)
}
