//! Dependency-graph task execution.
//!
//! `dag[i]` lists the tasks that depend on task `i`. [`run_parallel_dependency`]
//! calls `func(i)` exactly once per task and guarantees that for every edge
//! `i → j` the call `func(i)` has returned, with all its writes visible, before
//! `func(j)` starts. Tasks with no path between them may run concurrently.
//!
//! The parallel path seeds a lock-free MPMC queue with the tasks that have no
//! prerequisites. Each worker pops a task, runs it, decrements the indegree of
//! its dependents and pushes the ones that reach zero. Workers leave once every
//! sink (task without dependents) has completed.

#[cfg(feature = "rayon")]
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[cfg(feature = "rayon")]
use crossbeam_queue::SegQueue;

use crate::error::AmgError;
use crate::parallel::WorkerPool;

/// Execute `func` over every task of `dag` in dependency order.
///
/// Returns [`AmgError::InvalidDag`] for an out-of-range dependent and
/// [`AmgError::CyclicDependency`] if some tasks could never become ready.
pub fn run_parallel_dependency<F>(dag: &[Vec<usize>], pool: &WorkerPool, func: F) -> Result<(), AmgError>
where
    F: Fn(usize) + Sync,
{
    let num_tasks = dag.len();
    if num_tasks == 0 {
        return Ok(());
    }
    let indegree = count_dependencies(dag)?;

    #[cfg(feature = "rayon")]
    if !pool.is_sequential() {
        return run_workers(dag, indegree, pool, &func);
    }
    #[cfg(not(feature = "rayon"))]
    let _ = pool;
    run_sequential(dag, indegree, &func)
}

fn count_dependencies(dag: &[Vec<usize>]) -> Result<Vec<usize>, AmgError> {
    let num_tasks = dag.len();
    let mut indegree = vec![0usize; num_tasks];
    for (task, dependents) in dag.iter().enumerate() {
        for &dependent in dependents {
            if dependent >= num_tasks {
                return Err(AmgError::InvalidDag {
                    task,
                    dependent,
                    num_tasks,
                });
            }
            indegree[dependent] += 1;
        }
    }
    Ok(indegree)
}

fn run_sequential<F>(dag: &[Vec<usize>], mut indegree: Vec<usize>, func: &F) -> Result<(), AmgError>
where
    F: Fn(usize),
{
    let mut ready: Vec<usize> = (0..dag.len()).filter(|&i| indegree[i] == 0).collect();
    let mut processed = 0;
    while let Some(task) = ready.pop() {
        func(task);
        processed += 1;
        for &dependent in &dag[task] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.push(dependent);
            }
        }
    }
    check_complete(processed, dag.len())
}

#[cfg(feature = "rayon")]
fn run_workers<F>(dag: &[Vec<usize>], indegree: Vec<usize>, pool: &WorkerPool, func: &F) -> Result<(), AmgError>
where
    F: Fn(usize) + Sync,
{
    let num_sinks = dag.iter().filter(|d| d.is_empty()).count();
    let queue = SegQueue::new();
    for (task, &deg) in indegree.iter().enumerate() {
        if deg == 0 {
            queue.push(task);
        }
    }
    let indegree: Vec<AtomicUsize> = indegree.into_iter().map(AtomicUsize::new).collect();
    // queued or running; children are counted before their parent leaves
    let pending = AtomicUsize::new(queue.len());
    let sinks_done = AtomicUsize::new(0);
    let processed = AtomicUsize::new(0);
    let poisoned = AtomicBool::new(false);

    tracing::trace!(
        tasks = dag.len(),
        sinks = num_sinks,
        ready = queue.len(),
        workers = pool.workers(),
        "running dependency graph"
    );

    pool.broadcast(|_worker| {
        let _guard = PoisonOnPanic(&poisoned);
        loop {
            if sinks_done.load(Ordering::Acquire) >= num_sinks || poisoned.load(Ordering::Relaxed) {
                break;
            }
            let Some(task) = queue.pop() else {
                if pending.load(Ordering::Acquire) == 0 {
                    // nothing queued or running: either done or starved by a cycle
                    break;
                }
                std::hint::spin_loop();
                continue;
            };

            func(task);
            processed.fetch_add(1, Ordering::Relaxed);

            for &dependent in &dag[task] {
                if indegree[dependent].fetch_sub(1, Ordering::AcqRel) == 1 {
                    pending.fetch_add(1, Ordering::AcqRel);
                    queue.push(dependent);
                }
            }
            if dag[task].is_empty() {
                sinks_done.fetch_add(1, Ordering::AcqRel);
            }
            pending.fetch_sub(1, Ordering::AcqRel);
        }
    });

    check_complete(processed.into_inner(), dag.len())
}

/// Stops the remaining workers when a task panics, so the panic can
/// propagate out of the broadcast instead of leaving them spinning.
#[cfg(feature = "rayon")]
struct PoisonOnPanic<'a>(&'a AtomicBool);

#[cfg(feature = "rayon")]
impl Drop for PoisonOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.store(true, Ordering::Relaxed);
        }
    }
}

fn check_complete(processed: usize, total: usize) -> Result<(), AmgError> {
    if processed == total {
        Ok(())
    } else {
        Err(AmgError::CyclicDependency { processed, total })
    }
}
