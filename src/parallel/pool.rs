// rayon-backed worker pool for the dependency scheduler

#[cfg(feature = "rayon")]
use rayon::ThreadPool;

/// A fixed set of workers. With one worker (or without the `rayon` feature)
/// every scheduled job runs on the calling thread.
pub struct WorkerPool {
    workers: usize,
    #[cfg(feature = "rayon")]
    pool: Option<ThreadPool>,
}

impl WorkerPool {
    /// Pool sized to the hardware parallelism.
    pub fn new() -> Self {
        Self::with_workers(Self::hardware_parallelism())
    }

    /// Pool with exactly `workers` threads; `0` is treated as `1`.
    pub fn with_workers(workers: usize) -> Self {
        let workers = workers.max(1);
        #[cfg(feature = "rayon")]
        {
            let pool = if workers > 1 {
                match rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("h1amg-worker-{i}"))
                    .build()
                {
                    Ok(pool) => Some(pool),
                    Err(err) => {
                        tracing::warn!(%err, "failed to start worker pool, running sequentially");
                        None
                    }
                }
            } else {
                None
            };
            let workers = if pool.is_some() { workers } else { 1 };
            WorkerPool { workers, pool }
        }
        #[cfg(not(feature = "rayon"))]
        {
            let _ = workers;
            WorkerPool { workers: 1 }
        }
    }

    /// Single-threaded pool.
    pub fn sequential() -> Self {
        Self::with_workers(1)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_sequential(&self) -> bool {
        self.workers == 1
    }

    /// Run `op` inside the pool, so Rayon parallel iterators in `op` use these
    /// workers. A sequential pool runs `op` on the calling thread.
    pub fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        #[cfg(feature = "rayon")]
        if let Some(pool) = &self.pool {
            return pool.install(op);
        }
        op()
    }

    /// Run `job` once on every worker and wait for all of them.
    #[cfg(feature = "rayon")]
    pub(crate) fn broadcast<F>(&self, job: F)
    where
        F: Fn(usize) + Sync,
    {
        match &self.pool {
            Some(pool) => {
                pool.broadcast(|ctx| job(ctx.index()));
            }
            None => job(0),
        }
    }

    #[cfg(feature = "rayon")]
    fn hardware_parallelism() -> usize {
        num_cpus::get()
    }

    #[cfg(not(feature = "rayon"))]
    fn hardware_parallelism() -> usize {
        1
    }
}

/// True when called from a Rayon worker thread, i.e. inside
/// [`WorkerPool::install`] of a threaded pool. Data-parallel kernels only fan
/// out when this holds.
#[cfg(feature = "rayon")]
pub fn on_worker_thread() -> bool {
    rayon::current_thread_index().is_some()
}

#[cfg(not(feature = "rayon"))]
pub fn on_worker_thread() -> bool {
    false
}

/// Parallelism for Faer kernels: Rayon on a worker thread, otherwise
/// sequential.
pub fn kernel_parallelism() -> faer::Par {
    #[cfg(feature = "rayon")]
    if on_worker_thread() {
        return faer::Par::rayon(0);
    }
    faer::Par::Seq
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("workers", &self.workers).finish()
    }
}
