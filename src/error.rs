//! Error types shared by every stage of the analysis pipeline.

use thiserror::Error;

/// Result type alias using [FemError]
pub type Result<T> = std::result::Result<T, FemError>;

/// Recoverable failures surfaced by the kernel
#[derive(Error, Debug)]
pub enum FemError {
    /// A DOF, value, point or weight index outside of the valid range
    #[error("invalid {what} index {index} (valid range: 0..{len})")]
    InvalidIndex {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// Local coordinates with fewer components than the reference dimension
    #[error("expected at least {expected} local coordinates; received {received}")]
    InvalidLocalCoordinates { expected: usize, received: usize },

    /// Node coordinates must be 2D or 3D
    #[error("node {node_id} has {dim} coordinates; nodes must be 2D or 3D")]
    InvalidDimension { node_id: usize, dim: usize },

    /// Degenerate (zero area/volume) Element geometry
    #[error("singular jacobian on element {element_id} (det = {determinant:e})")]
    SingularJacobian { element_id: usize, determinant: f64 },

    /// Element reference dimension does not match the embedding space
    #[error("non-square jacobian ({rows}x{cols}) on element {element_id}")]
    NonSquareJacobian {
        element_id: usize,
        rows: usize,
        cols: usize,
    },

    /// Geometric quantities requested before the coordinate matrix was generated
    #[error("coordinates matrix of element {0} has not been generated")]
    MissingGeometry(usize),

    /// Lengths of DOF lists, matrices or vectors that should agree do not
    #[error("dof mismatch: {0}")]
    DofMismatch(String),

    #[error("node {0} does not exist")]
    UnknownNode(usize),

    #[error("node {0} already exists")]
    DuplicateNode(usize),

    #[error("element {0} already exists")]
    DuplicateElement(usize),

    /// Element connectivity does not agree with its shape function
    #[error("element {element_id} has {received} nodes; its shape function requires {expected}")]
    NodeCountMismatch {
        element_id: usize,
        expected: usize,
        received: usize,
    },

    #[error("quadrature rules require at least one point (received {0})")]
    InvalidQuadratureOrder(usize),

    /// Iterative solve hit its iteration cap
    #[error("solver did not converge after {iterations} iterations (relative residual: {residual:e})")]
    SolverDidNotConverge { iterations: usize, residual: f64 },

    #[error("singular system: {0}")]
    SingularSystem(String),

    #[error("system exceeded maximum size ({max}x{max}); received {received} unknowns")]
    SystemTooLarge { max: usize, received: usize },

    /// Global DOF ids are missing or stale
    #[error("global dofs have not been generated (or were invalidated)")]
    DofsNotNumbered,

    /// A workflow phase was invoked before its prerequisites
    #[error("workflow order violated: {0}")]
    WorkflowOrder(&'static str),

    #[error("material '{material}' has no property '{property}'")]
    UnknownProperty { material: String, property: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FemError {
    pub(crate) fn invalid_index(what: &'static str, index: usize, len: usize) -> Self {
        Self::InvalidIndex { what, index, len }
    }
}
