use super::{check_local_coordinates, ShapeFunction, Topology};
use crate::error::Result;
use nalgebra::{DMatrix, DVector};

/// Linear 2-Node Line Element over `ξ ∈ [-1, 1]`
///
/// Local Node order: `ξ = -1`, `ξ = +1`
#[derive(Debug, Clone, Copy, Default)]
pub struct Line2;

/// Linear 3-Node Triangle over the unit reference triangle
///
/// Local Node order: `(0, 0)`, `(1, 0)`, `(0, 1)`
#[derive(Debug, Clone, Copy, Default)]
pub struct Tri3;

/// Bilinear 4-Node Quadrilateral over `[-1, 1]²`
///
/// Local Node order is counter-clockwise: `(-1, -1)`, `(1, -1)`, `(1, 1)`, `(-1, 1)`
#[derive(Debug, Clone, Copy, Default)]
pub struct Quad4;

const QUAD4_CORNERS: [[f64; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

impl ShapeFunction for Line2 {
    fn topology(&self) -> Topology {
        Topology::Line
    }

    fn num_nodes(&self) -> usize {
        2
    }

    fn evaluate(&self, local_coords: &[f64]) -> Result<DVector<f64>> {
        check_local_coordinates(local_coords, 1)?;
        let xi = local_coords[0];
        Ok(DVector::from_column_slice(&[
            0.5 * (1.0 - xi),
            0.5 * (1.0 + xi),
        ]))
    }

    fn evaluate_derivatives(&self, local_coords: &[f64]) -> Result<DMatrix<f64>> {
        check_local_coordinates(local_coords, 1)?;
        Ok(DMatrix::from_row_slice(1, 2, &[-0.5, 0.5]))
    }

    fn reference_nodes(&self) -> Vec<Vec<f64>> {
        vec![vec![-1.0], vec![1.0]]
    }
}

impl ShapeFunction for Tri3 {
    fn topology(&self) -> Topology {
        Topology::Triangle
    }

    fn num_nodes(&self) -> usize {
        3
    }

    fn evaluate(&self, local_coords: &[f64]) -> Result<DVector<f64>> {
        check_local_coordinates(local_coords, 2)?;
        let (xi, eta) = (local_coords[0], local_coords[1]);
        Ok(DVector::from_column_slice(&[1.0 - xi - eta, xi, eta]))
    }

    // constant over the whole Element
    fn evaluate_derivatives(&self, local_coords: &[f64]) -> Result<DMatrix<f64>> {
        check_local_coordinates(local_coords, 2)?;
        Ok(DMatrix::from_row_slice(
            2,
            3,
            &[
                -1.0, 1.0, 0.0, //
                -1.0, 0.0, 1.0,
            ],
        ))
    }

    fn reference_nodes(&self) -> Vec<Vec<f64>> {
        vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]]
    }
}

impl ShapeFunction for Quad4 {
    fn topology(&self) -> Topology {
        Topology::Quadrilateral
    }

    fn num_nodes(&self) -> usize {
        4
    }

    fn evaluate(&self, local_coords: &[f64]) -> Result<DVector<f64>> {
        check_local_coordinates(local_coords, 2)?;
        let (xi, eta) = (local_coords[0], local_coords[1]);
        Ok(DVector::from_iterator(
            4,
            QUAD4_CORNERS
                .iter()
                .map(|[xi_n, eta_n]| 0.25 * (1.0 + xi_n * xi) * (1.0 + eta_n * eta)),
        ))
    }

    fn evaluate_derivatives(&self, local_coords: &[f64]) -> Result<DMatrix<f64>> {
        check_local_coordinates(local_coords, 2)?;
        let (xi, eta) = (local_coords[0], local_coords[1]);
        Ok(DMatrix::from_fn(2, 4, |r, c| {
            let [xi_n, eta_n] = QUAD4_CORNERS[c];
            match r {
                0 => 0.25 * xi_n * (1.0 + eta_n * eta),
                _ => 0.25 * eta_n * (1.0 + xi_n * xi),
            }
        }))
    }

    fn reference_nodes(&self) -> Vec<Vec<f64>> {
        QUAD4_CORNERS.iter().map(|corner| corner.to_vec()).collect()
    }
}
