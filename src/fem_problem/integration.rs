/// Gauss-Legendre-Quadrature point generation
pub mod glq;

use crate::error::{FemError, Result};
use crate::fem_domain::basis::Topology;
use glq::gauss_quadrature_points;
use smallvec::{smallvec, SmallVec};
use std::fmt;

/// An ordered set of weighted sample points used to integrate over a reference domain.
///
/// All points and weights are computed upon construction; the rule can be iterated any number of times.
#[derive(Debug, Clone)]
pub struct Quadrature {
    topology: Topology,
    points: Vec<SmallVec<[f64; 2]>>,
    weights: Vec<f64>,
}

impl Quadrature {
    /// 1D Gauss-Legendre rule with `n` points over `[-1, 1]`. Exact for polynomials of degree `2n - 1`.
    ///
    /// ```
    /// use fem_kernel::Quadrature;
    ///
    /// let rule = Quadrature::gauss_legendre(3).unwrap();
    /// let integral = rule.integrate(|x| x[0].powi(4));
    /// assert!((integral - 0.4).abs() < 1e-12);
    /// ```
    pub fn gauss_legendre(n: usize) -> Result<Self> {
        let (points, weights) = checked_glq(n)?;

        Ok(Self {
            topology: Topology::Line,
            points: points.iter().map(|p| smallvec![*p]).collect(),
            weights,
        })
    }

    /// Tensor product of the `n` point Gauss-Legendre rule with itself (`n²` points) over `[-1, 1]²`
    ///
    /// ```
    /// use fem_kernel::Quadrature;
    ///
    /// let rule = Quadrature::rectangle(2).unwrap();
    /// assert_eq!(rule.len(), 4);
    /// let integral = rule.integrate(|p| p[0].powi(2) * p[1].powi(2));
    /// assert!((integral - 4.0 / 9.0).abs() < 1e-12);
    /// ```
    pub fn rectangle(n: usize) -> Result<Self> {
        let (glq_points, glq_weights) = checked_glq(n)?;

        let mut points = Vec::with_capacity(n * n);
        let mut weights = Vec::with_capacity(n * n);
        for (p_i, w_i) in glq_points.iter().zip(glq_weights.iter()) {
            for (p_j, w_j) in glq_points.iter().zip(glq_weights.iter()) {
                points.push(smallvec![*p_i, *p_j]);
                weights.push(w_i * w_j);
            }
        }

        Ok(Self {
            topology: Topology::Quadrilateral,
            points,
            weights,
        })
    }

    /// Collapsed-coordinate (Duffy) mapping of the `n²` point rectangle rule onto the unit reference triangle.
    ///
    /// The weights include the Jacobian of the collapse, so they sum to the triangle's area (`0.5`).
    ///
    /// ```
    /// use fem_kernel::Quadrature;
    ///
    /// let rule = Quadrature::triangle(4).unwrap();
    /// assert!((rule.integrate(|_| 1.0) - 0.5).abs() < 1e-14);
    /// ```
    pub fn triangle(n: usize) -> Result<Self> {
        let (glq_points, glq_weights) = checked_glq(n)?;

        let mut points = Vec::with_capacity(n * n);
        let mut weights = Vec::with_capacity(n * n);
        for (p_i, w_i) in glq_points.iter().zip(glq_weights.iter()) {
            for (p_j, w_j) in glq_points.iter().zip(glq_weights.iter()) {
                points.push(smallvec![
                    (1.0 + p_i) * (1.0 + p_j) / 4.0,
                    (1.0 + p_i) * (1.0 - p_j) / 4.0
                ]);
                weights.push((1.0 + p_i) / 8.0 * w_i * w_j);
            }
        }

        Ok(Self {
            topology: Topology::Triangle,
            points,
            weights,
        })
    }

    /// Compute `Σ wᵢ·f(pointᵢ)`
    pub fn integrate<F>(&self, integrand: F) -> f64
    where
        F: Fn(&[f64]) -> f64,
    {
        self.iter().map(|(point, weight)| integrand(point) * weight).sum()
    }

    /// Iterate over the `(point, weight)` pairs of the rule
    pub fn iter(&self) -> impl Iterator<Item = (&[f64], f64)> + '_ {
        self.points
            .iter()
            .zip(self.weights.iter())
            .map(|(point, weight)| (point.as_slice(), *weight))
    }

    pub fn point(&self, index: usize) -> Result<&[f64]> {
        self.points
            .get(index)
            .map(|p| p.as_slice())
            .ok_or_else(|| FemError::invalid_index("quadrature point", index, self.len()))
    }

    pub fn weight(&self, index: usize) -> Result<f64> {
        self.weights
            .get(index)
            .copied()
            .ok_or_else(|| FemError::invalid_index("quadrature weight", index, self.len()))
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// The reference domain this rule integrates over
    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl fmt::Display for Quadrature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{} Quadrature ({} points)", self.topology, self.len())?;
        for (i, (point, weight)) in self.iter().enumerate() {
            writeln!(f, "\t{}: {:?} \t w = {}", i, point, weight)?;
        }
        Ok(())
    }
}

fn checked_glq(n: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    if n == 0 {
        Err(FemError::InvalidQuadratureOrder(n))
    } else {
        Ok(gauss_quadrature_points(n))
    }
}
