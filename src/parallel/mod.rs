//! Shared-memory parallelism: the worker pool and the dependency scheduler.

pub mod dag;
pub mod pool;

pub use dag::run_parallel_dependency;
pub use pool::{kernel_parallelism, on_worker_thread, WorkerPool};
