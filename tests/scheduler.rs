//! Dependency scheduler tests for h1amg
//!
//! Random acyclic task graphs are executed under a single worker and under a
//! multi-threaded pool. Each run must invoke every task exactly once and must
//! finish every prerequisite of a task before that task starts.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use h1amg::error::AmgError;
use h1amg::parallel::{run_parallel_dependency, WorkerPool};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random DAG over `n` tasks: an edge i → j (i < j) is present with probability `density`.
fn random_dag(n: usize, density: f64, seed: u64) -> Vec<Vec<usize>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| (i + 1..n).filter(|_| rng.gen_bool(density)).collect())
        .collect()
}

/// Runs `dag` on `pool`, returning (calls per task, number of ordering violations).
fn execute(dag: &[Vec<usize>], pool: &WorkerPool) -> (Vec<usize>, usize) {
    let n = dag.len();
    let mut preds = vec![Vec::new(); n];
    for (i, deps) in dag.iter().enumerate() {
        for &j in deps {
            preds[j].push(i);
        }
    }
    let calls: Vec<AtomicUsize> = (0..n).map(|_| AtomicUsize::new(0)).collect();
    let done: Vec<AtomicBool> = (0..n).map(|_| AtomicBool::new(false)).collect();
    let violations = AtomicUsize::new(0);

    run_parallel_dependency(dag, pool, |task| {
        if preds[task].iter().any(|&p| !done[p].load(Ordering::Relaxed)) {
            violations.fetch_add(1, Ordering::Relaxed);
        }
        calls[task].fetch_add(1, Ordering::Relaxed);
        done[task].store(true, Ordering::Relaxed);
    })
    .unwrap();

    (
        calls.into_iter().map(AtomicUsize::into_inner).collect(),
        violations.into_inner(),
    )
}

#[test]
fn random_dags_respect_dependencies_single_worker() {
    let pool = WorkerPool::sequential();
    for (seed, &(n, density)) in [(10, 0.3), (100, 0.05), (300, 0.01), (50, 0.9)].iter().enumerate() {
        let dag = random_dag(n, density, seed as u64);
        let (calls, violations) = execute(&dag, &pool);
        assert!(calls.iter().all(|&c| c == 1), "every task runs exactly once");
        assert_eq!(violations, 0);
    }
}

#[test]
fn random_dags_respect_dependencies_many_workers() {
    for workers in [2, 4, 8] {
        let pool = WorkerPool::with_workers(workers);
        for seed in 0..10u64 {
            let dag = random_dag(200, 0.02 + 0.01 * seed as f64, 100 + seed);
            let (calls, violations) = execute(&dag, &pool);
            assert!(calls.iter().all(|&c| c == 1), "every task runs exactly once");
            assert_eq!(violations, 0, "{workers} workers, seed {seed}");
        }
    }
}

#[test]
fn independent_tasks_all_run() {
    let dag = vec![Vec::new(); 1000];
    let pool = WorkerPool::with_workers(4);
    let (calls, _) = execute(&dag, &pool);
    assert_eq!(calls.iter().sum::<usize>(), 1000);
}

#[test]
fn wide_fan_in_waits_for_every_source() {
    // tasks 0..63 all feed task 64
    let mut dag: Vec<Vec<usize>> = (0..64).map(|_| vec![64]).collect();
    dag.push(Vec::new());
    for pool in [WorkerPool::sequential(), WorkerPool::with_workers(4)] {
        let (calls, violations) = execute(&dag, &pool);
        assert_eq!(calls[64], 1);
        assert_eq!(violations, 0);
    }
}

#[test]
fn cycle_is_reported_under_workers() {
    // 0 → 1 → 2 → 1, plus an independent sink 3
    let dag = vec![vec![1], vec![2], vec![1], vec![]];
    let result = run_parallel_dependency(&dag, &WorkerPool::with_workers(3), |_| {});
    assert!(matches!(result, Err(AmgError::CyclicDependency { total: 4, .. })));
}

#[test]
fn empty_dag_is_a_noop() {
    let calls = AtomicUsize::new(0);
    run_parallel_dependency(&[], &WorkerPool::with_workers(2), |_| {
        calls.fetch_add(1, Ordering::Relaxed);
    })
    .unwrap();
    assert_eq!(calls.into_inner(), 0);
}
