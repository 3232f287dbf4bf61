//! A Finite Element Analysis Kernel
//!
//! The pipeline: number the Degrees of Freedom of a [Mesh], evaluate [ShapeFunction]s and Element geometry
//! at [Quadrature] points, assemble a global sparse system, eliminate Dirichlet constraints, and solve.
//!
//! Problem-specific physics is supplied through the [ElementFormulation] trait.

/// Runtime settings for integration, assembly, and solving
pub mod config;
/// Error Types
pub mod error;
/// Shape Functions and the geometric and topological structure of an FEM Domain
pub mod fem_domain;
/// Integration, linear algebra, and the analysis workflow
pub mod fem_problem;

pub use config::{FemConfig, SolverConfig};
pub use error::{FemError, Result};
pub use fem_domain::basis::{
    shape_fns::{Line2, Quad4, Tri3},
    ShapeFunction, Topology,
};
pub use fem_domain::domain::{
    boundary::BoundaryCondition,
    mesh::{
        element::{Derivatives, Element},
        material::Material,
        node::{Node, NodeSet},
        Mesh, MeshSource,
    },
};
pub use fem_problem::{
    integration::Quadrature,
    linalg::{
        dense_solve::DenseSolver, iterative::IterativeSolver, ElementContribution, EquationSolver,
        GlobalSystem,
    },
    model::{diffusion::ScalarDiffusion, ElementFormulation, LinearModel, PhysicsModel},
};

pub use nalgebra::{DMatrix, DVector};
pub use nalgebra_sparse::CscMatrix;
pub use num_complex::Complex64;

/// Scalar type of nodal field values, element matrices, and the global system
///
/// Implemented for every copyable [nalgebra::ComplexField]: `f32`, `f64` and [Complex64] among others
pub trait FemValue: nalgebra::ComplexField + Copy {}

impl<T: nalgebra::ComplexField + Copy> FemValue for T {}

/// Lossy conversion of a real scalar into an `f64` (used for logging and export)
pub(crate) fn to_f64<R: nalgebra::RealField>(value: R) -> f64 {
    nalgebra::try_convert(value).unwrap_or(f64::NAN)
}

/// Real and imaginary parts of a field value
pub(crate) fn split_value<T: FemValue>(value: T) -> (f64, f64) {
    (to_f64(value.real()), to_f64(value.imaginary()))
}
