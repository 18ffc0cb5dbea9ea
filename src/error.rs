use faer::sparse::FaerError;
use thiserror::Error;

// Unified error type for h1amg

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AmgError {
    #[error("{what} {index} references vertex {vertex}, but the graph has {num_vertices} vertices")]
    VertexOutOfRange {
        what: &'static str,
        index: usize,
        vertex: usize,
        num_vertices: usize,
    },
    #[error("edge {edge} is a self-loop on vertex {vertex}")]
    SelfLoop { edge: usize, vertex: usize },
    #[error("length mismatch for {what}: expected {expected}, found {found}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("non-finite {what} at index {index}")]
    NonFiniteWeight { what: &'static str, index: usize },
    #[error("cannot build a hierarchy over a graph with zero vertices")]
    EmptyGraph,
    #[error("task {task} lists dependent {dependent}, but only {num_tasks} tasks exist")]
    InvalidDag {
        task: usize,
        dependent: usize,
        num_tasks: usize,
    },
    #[error("cyclic dependency: only {processed} of {total} tasks could run")]
    CyclicDependency { processed: usize, total: usize },
    #[error("singular diagonal block {block} in block smoother")]
    SingularBlock { block: usize },
    #[error("invalid option: {0}")]
    InvalidOption(&'static str),
    #[error("sparse kernel failed: {0}")]
    Sparse(#[from] FaerError),
}
