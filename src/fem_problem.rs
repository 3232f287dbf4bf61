/// Quadrature rules used to integrate over reference Element domains
pub mod integration;

/// Global system assembly buffers and linear solvers
pub mod linalg;

/// The assemble → constrain → solve → scatter workflow and the per-Element physics extension point
pub mod model;
