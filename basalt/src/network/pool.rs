use crate::{
    config::Config,
    network::task::{ChunkRequestTask, ChunkTaskError},
};
use basalt_util::threadpool::DynamicThreadPool;
use parking_lot::Mutex;
use std::io;

/// Runs chunk request tasks off of the owning thread.
pub trait WorkerPool: Send + Sync {
    fn submit(&self, task: ChunkRequestTask);
}

/// A worker pool backed by a [`DynamicThreadPool`].
pub struct ChunkWorkerPool {
    pool: Mutex<DynamicThreadPool<ChunkRequestTask, (), ChunkTaskError>>,
}

impl ChunkWorkerPool {
    /// Opens a pool sized and balanced according to the given config.
    pub fn open(config: &Config) -> io::Result<Self> {
        let pool = DynamicThreadPool::open(
            &"ChunkWorkers",
            config.worker_threads,
            (),
            config.distribution_strategy.into(),
            run_task,
        )?;

        Ok(ChunkWorkerPool {
            pool: Mutex::new(pool),
        })
    }

    pub fn size(&self) -> usize {
        self.pool.lock().size()
    }

    pub fn pending_job_count(&self) -> usize {
        self.pool.lock().pending_job_count()
    }

    /// Completes every queued task and joins the workers. Tasks submitted afterwards are dropped.
    pub fn close(&self) {
        self.pool.lock().close();
    }
}

impl WorkerPool for ChunkWorkerPool {
    fn submit(&self, task: ChunkRequestTask) {
        self.pool.lock().add_job(task);
    }
}

fn run_task(task: ChunkRequestTask, _state: &mut ()) -> Result<(), ChunkTaskError> {
    task.run()
}
