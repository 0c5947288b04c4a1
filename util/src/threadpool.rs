use log::error;
use std::error::Error;
use std::fmt::Display;
use std::io;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc::{self, SendError, Sender},
    Arc,
};
use std::thread::{self, JoinHandle};

/// A fixed-size, load-spreading threadpool that executes a specific function.
///
/// The function this pool's workers execute accepts an owned "job" and a mutable reference to an internal
/// "state". Each worker owns a clone of the initial state, which allows jobs to reuse per-thread
/// resources such as scratch buffers without any synchronization.
///
/// Jobs are fire-and-forget: an error returned by the executor is logged and otherwise dropped, so
/// jobs that need to report failure must carry their own reporting channel.
pub struct DynamicThreadPool<J, S, E> {
    name: String,
    pool: Vec<Worker<J>>,
    pool_cursor: usize,
    distribution_strategy: DistributionStrategy,
    executor: fn(J, &mut S) -> Result<(), E>,
    initial_state: S,
}

impl<J, S, E> DynamicThreadPool<J, S, E> {
    /// Closes this pool and joins all underlying worker threads. Jobs which were already queued are
    /// completed before the workers exit.
    pub fn close(&mut self) {
        for worker in self.pool.drain(..) {
            worker.join();
        }
    }

    /// Returns the number of workers in this pool.
    pub fn size(&self) -> usize {
        self.pool.len()
    }

    /// Returns the total number of jobs which have been queued but not yet completed.
    pub fn pending_job_count(&self) -> usize {
        self.pool.iter().map(Worker::pending_job_count).sum()
    }
}

impl<J, S, E> DynamicThreadPool<J, S, E>
where
    J: Send + 'static,
    S: Send + Clone + 'static,
    E: Into<Box<dyn Error>> + 'static,
{
    /// Creates a new threadpool with the given name and size.
    ///
    /// The initial state provided is the state in which all new worker threads will be spawned.
    /// This method spawns the given number of worker threads (at least one) which immediately block
    /// while waiting for incoming jobs.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the thread pool, also used to name its worker threads
    /// * `size` - The number of workers this pool is constructed with
    /// * `initial_state` - The initial state of all worker threads in this pool
    /// * `distribution_strategy` - The distribution strategy of this pool (see [`DistributionStrategy`]
    /// and [`add_job`] for more details)
    /// * `executor` - The job executor
    ///
    /// [`DistributionStrategy`]: crate::threadpool::DistributionStrategy
    /// [`add_job`]: crate::threadpool::DynamicThreadPool::add_job
    pub fn open<N: Display>(
        name: &N,
        size: usize,
        initial_state: S,
        distribution_strategy: DistributionStrategy,
        executor: fn(J, &mut S) -> Result<(), E>,
    ) -> io::Result<Self> {
        let mut pool = DynamicThreadPool {
            name: name.to_string(),
            pool: Vec::with_capacity(size.max(1)),
            pool_cursor: 0,
            distribution_strategy,
            executor,
            initial_state,
        };

        for i in 0 .. size.max(1) {
            pool.add_worker(i + 1)?;
        }

        Ok(pool)
    }

    fn add_worker(&mut self, number: usize) -> io::Result<()> {
        let worker = Worker::spawn(
            self.name.clone(),
            number,
            self.initial_state.clone(),
            self.executor,
        )?;
        self.pool.push(worker);
        Ok(())
    }

    /// Adds a job for the pool to complete.
    ///
    /// The pool will select a worker based on the distribution strategy this pool was opened with. If
    /// the [`EqualLoad`] strategy was used, then the worker with the minimum number of pending jobs will
    /// be selected. If the [`Fast`] strategy was used, then the pool will assign one job to every worker
    /// in the pool before the same worker is given a second job.
    ///
    /// [`EqualLoad`]: crate::threadpool::DistributionStrategy::EqualLoad
    /// [`Fast`]: crate::threadpool::DistributionStrategy::Fast
    pub fn add_job(&mut self, job: J) {
        let mut available_worker: Option<&Worker<J>> = None;

        match self.distribution_strategy {
            DistributionStrategy::EqualLoad => {
                let mut min_pending = usize::MAX;

                for worker in self.pool.iter() {
                    let pending_jobs = worker.pending_job_count();

                    if pending_jobs == 0 {
                        available_worker = Some(worker);
                        break;
                    } else if pending_jobs < min_pending {
                        min_pending = pending_jobs;
                        available_worker = Some(worker);
                    }
                }
            }

            DistributionStrategy::Fast => {
                if self.pool_cursor >= self.pool.len() {
                    self.pool_cursor = 0;
                }

                available_worker = self.pool.get(self.pool_cursor);
                self.pool_cursor += 1;
            }
        }

        match available_worker {
            Some(worker) =>
                if let Err(e) = worker.send_job(job) {
                    error!("Failed to send job to worker in {}: {}", self.name, e);
                },
            None => error!("Dropped job submitted to closed pool {}", self.name),
        }
    }
}

impl<J, S, E> Drop for DynamicThreadPool<J, S, E> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Different strategies a thread pool can use to spread the job load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistributionStrategy {
    /// Ensures that, to the best of the pool's ability, each worker has approximately an equal work
    /// load.
    EqualLoad,
    /// Does not guarantee that workers will have an equal load, however jobs will be given out as
    /// evenly as possible without sacrificing efficiency.
    Fast,
}

/// A worker for a threadpool. Workers keep track of their pending job count autonomously.
struct Worker<J> {
    job_sender: Sender<Option<J>>,
    pending_job_count: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl<J> Worker<J> {
    fn pending_job_count(&self) -> usize {
        self.pending_job_count.load(Ordering::SeqCst)
    }

    fn join(self) {
        // There isn't really anything useful we could do with the errors that could occur here
        drop(self.job_sender.send(None));
        drop(self.handle.join());
    }
}

impl<J: Send + 'static> Worker<J> {
    fn spawn<S, E>(
        pool_name: String,
        number: usize,
        mut state: S,
        executor: fn(J, &mut S) -> Result<(), E>,
    ) -> io::Result<Worker<J>>
    where
        S: Send + 'static,
        E: Into<Box<dyn Error>> + 'static,
    {
        let (job_sender, job_receiver) = mpsc::channel::<Option<J>>();
        let pending_job_count = Arc::new(AtomicUsize::new(0));
        let job_count_clone = pending_job_count.clone();
        let thread_name = format!("{}/Worker#{}", pool_name, number);

        let handle = thread::Builder::new().name(thread_name.clone()).spawn(move || {
            while let Ok(Some(job)) = job_receiver.recv() {
                if let Err(e) = executor(job, &mut state) {
                    error!("Error handling job in {}: {}", thread_name, e.into());
                }

                job_count_clone.fetch_sub(1, Ordering::SeqCst);
            }
        })?;

        Ok(Worker {
            pending_job_count,
            job_sender,
            handle,
        })
    }

    fn send_job(&self, job: J) -> Result<(), SendError<Option<J>>> {
        self.pending_job_count.fetch_add(1, Ordering::SeqCst);
        self.job_sender.send(Some(job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::mpsc::channel, time::Duration};

    fn echo(job: (u32, Sender<u32>), calls: &mut u32) -> Result<(), io::Error> {
        *calls += 1;
        job.1
            .send(job.0 * 2)
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e.to_string()))
    }

    #[test]
    fn jobs_complete_on_every_strategy() {
        for strategy in [DistributionStrategy::EqualLoad, DistributionStrategy::Fast] {
            let mut pool = DynamicThreadPool::open(&"test-pool", 3, 0u32, strategy, echo)
                .expect("Failed to open pool");
            assert_eq!(pool.size(), 3);

            let (sender, receiver) = channel();
            for i in 0 .. 10 {
                pool.add_job((i, sender.clone()));
            }

            let mut results = (0 .. 10)
                .map(|_| {
                    receiver
                        .recv_timeout(Duration::from_secs(5))
                        .expect("Job did not complete")
                })
                .collect::<Vec<_>>();
            results.sort_unstable();
            assert_eq!(results, (0 .. 10).map(|i| i * 2).collect::<Vec<_>>());

            pool.close();
            assert_eq!(pool.pending_job_count(), 0, "Closed pool should have no pending jobs");
        }
    }

    #[test]
    fn zero_sized_pool_has_one_worker() {
        let pool = DynamicThreadPool::open(&"tiny", 0, 0u32, DistributionStrategy::Fast, echo)
            .expect("Failed to open pool");
        assert_eq!(pool.size(), 1);
    }
}
