/// Lagrange Shape Functions for the supported Element topologies
pub mod shape_fns;

use crate::error::{FemError, Result};
use crate::fem_problem::integration::Quadrature;
use nalgebra::{DMatrix, DVector};
use std::fmt;

/// The reference topology of an Element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    /// Line segment over `[-1, 1]`
    Line,
    /// Unit triangle with vertices `(0, 0)`, `(1, 0)` and `(0, 1)`
    Triangle,
    /// Square over `[-1, 1]²`
    Quadrilateral,
}

impl Topology {
    /// Number of local coordinates needed to address a point in the reference domain
    pub fn reference_dim(&self) -> usize {
        match self {
            Self::Line => 1,
            Self::Triangle | Self::Quadrilateral => 2,
        }
    }

    /// Measure (length or area) of the reference domain
    pub fn reference_measure(&self) -> f64 {
        match self {
            Self::Line => 2.0,
            Self::Triangle => 0.5,
            Self::Quadrilateral => 4.0,
        }
    }

    /// Build the quadrature rule which integrates over this reference domain, using `order` points along each direction
    pub fn quadrature(&self, order: usize) -> Result<Quadrature> {
        match self {
            Self::Line => Quadrature::gauss_legendre(order),
            Self::Triangle => Quadrature::triangle(order),
            Self::Quadrilateral => Quadrature::rectangle(order),
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Line => write!(f, "Line"),
            Self::Triangle => write!(f, "Triangle"),
            Self::Quadrilateral => write!(f, "Quadrilateral"),
        }
    }
}

/// Interpolation functions over a fixed Element topology.
///
/// Implementations are stateless and shared (via `Arc`) between all Elements of the same topology.
/// [Line2](shape_fns::Line2), [Tri3](shape_fns::Tri3) and [Quad4](shape_fns::Quad4) implement this trait.
pub trait ShapeFunction: fmt::Debug + Send + Sync {
    fn topology(&self) -> Topology;

    /// Number of Nodes (and therefore the number of functions)
    fn num_nodes(&self) -> usize;

    /// Evaluate every function at a point in the reference domain. Output has length `num_nodes()`.
    fn evaluate(&self, local_coords: &[f64]) -> Result<DVector<f64>>;

    /// Evaluate the local derivatives at a point in the reference domain.
    ///
    /// Output has one row per reference direction and one column per Node.
    fn evaluate_derivatives(&self, local_coords: &[f64]) -> Result<DMatrix<f64>>;

    /// Location of each Node in the reference domain (in local Node order)
    fn reference_nodes(&self) -> Vec<Vec<f64>>;

    fn reference_dim(&self) -> usize {
        self.topology().reference_dim()
    }
}

/// Reject local coordinates which do not address a point in a `dim`-dimensional reference domain
pub(crate) fn check_local_coordinates(local_coords: &[f64], dim: usize) -> Result<()> {
    if local_coords.len() < dim {
        Err(FemError::InvalidLocalCoordinates {
            expected: dim,
            received: local_coords.len(),
        })
    } else {
        Ok(())
    }
}
