use super::{check_square_system, diagonal, spmv, EquationSolver};
use crate::config::{SolverConfig, DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE};
use crate::error::{FemError, Result};
use crate::{to_f64, FemValue};
use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use tracing::{debug, warn};

/// Conjugate Gradient solver with a Jacobi (diagonal) preconditioner.
///
/// Converges when the relative residual `‖b - Ax‖ / ‖b‖` falls to `tolerance`.
/// The matrix must be stored in full (both triangles) and be Hermitian positive-definite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterativeSolver {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl IterativeSolver {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
        }
    }
}

impl Default for IterativeSolver {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE, DEFAULT_MAX_ITERATIONS)
    }
}

impl From<SolverConfig> for IterativeSolver {
    fn from(config: SolverConfig) -> Self {
        Self::new(config.tolerance, config.max_iterations)
    }
}

impl<T: FemValue> EquationSolver<T> for IterativeSolver {
    fn solve(&self, matrix: &CscMatrix<T>, rhs: &DVector<T>) -> Result<DVector<T>> {
        check_square_system(matrix, rhs)?;

        let n = rhs.len();
        let rhs_norm = rhs.norm();
        if rhs_norm == nalgebra::zero() {
            debug!(unknowns = n, "zero right-hand side; returning the trivial solution");
            return Ok(DVector::zeros(n));
        }

        let mut inv_diag = diagonal(matrix);
        for (row, d) in inv_diag.iter_mut().enumerate() {
            if *d == T::zero() {
                return Err(FemError::SingularSystem(format!(
                    "zero diagonal entry in row {}",
                    row
                )));
            }
            *d = T::one() / *d;
        }

        let tolerance: T::RealField = nalgebra::convert(self.tolerance);

        let mut x = DVector::zeros(n);
        let mut r = rhs.clone();
        let mut z = r.component_mul(&inv_diag);
        let mut p = z.clone();
        let mut rz = r.dotc(&z);
        let mut relative_residual: T::RealField = nalgebra::one();

        for iteration in 1..=self.max_iterations {
            let ap = spmv(matrix, &p)?;
            let pap = p.dotc(&ap);
            if pap == T::zero() {
                return Err(FemError::SingularSystem(format!(
                    "conjugate gradient breakdown at iteration {}",
                    iteration
                )));
            }

            let alpha = rz / pap;
            x.axpy(alpha, &p, T::one());
            r.axpy(-alpha, &ap, T::one());

            relative_residual = r.norm() / rhs_norm.clone();
            if relative_residual <= tolerance {
                debug!(
                    iterations = iteration,
                    residual = to_f64(relative_residual),
                    "conjugate gradient converged"
                );
                return Ok(x);
            }

            z = r.component_mul(&inv_diag);
            let rz_next = r.dotc(&z);
            let beta = rz_next / rz;
            rz = rz_next;
            p = &z + p * beta;
        }

        let residual = to_f64(relative_residual);
        warn!(
            iterations = self.max_iterations,
            residual, "conjugate gradient did not converge"
        );
        Err(FemError::SolverDidNotConverge {
            iterations: self.max_iterations,
            residual,
        })
    }

    fn name(&self) -> &'static str {
        "jacobi-pcg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;
    use nalgebra_sparse::CooMatrix;
    use num_complex::Complex64;

    fn laplacian_1d(n: usize) -> CscMatrix<f64> {
        let mut coo = CooMatrix::new(n, n);
        for i in 0..n {
            coo.push(i, i, 2.0);
            if i + 1 < n {
                coo.push(i, i + 1, -1.0);
                coo.push(i + 1, i, -1.0);
            }
        }
        CscMatrix::from(&coo)
    }

    #[test]
    fn defaults() {
        let solver = IterativeSolver::default();
        assert_eq!(solver.tolerance, 1e-6);
        assert_eq!(solver.max_iterations, 1000);
        assert_eq!(IterativeSolver::from(SolverConfig::default()), solver);
    }

    #[test]
    fn solves_spd_system() {
        let n = 30;
        let matrix = laplacian_1d(n);
        let expected = DVector::from_iterator(n, (0..n).map(|i| (i as f64 * 0.3).sin()));
        let rhs = spmv(&matrix, &expected).unwrap();

        let solver = IterativeSolver::new(1e-12, 500);
        let x = solver.solve(&matrix, &rhs).unwrap();
        assert!((x - expected).amax() < 1e-9);
    }

    #[test]
    fn matches_dense_solution() {
        let matrix = laplacian_1d(8);
        let rhs = DVector::from_element(8, 1.0);

        let x = IterativeSolver::new(1e-12, 100).solve(&matrix, &rhs).unwrap();
        let dense = DMatrix::from(&matrix).lu().solve(&rhs).unwrap();
        assert!((x - dense).amax() < 1e-9);
    }

    #[test]
    fn zero_rhs_gives_zero_solution() {
        let matrix = laplacian_1d(4);
        let x = IterativeSolver::default()
            .solve(&matrix, &DVector::zeros(4))
            .unwrap();
        assert_eq!(x, DVector::zeros(4));
    }

    #[test]
    fn reports_non_convergence() {
        let matrix = laplacian_1d(50);
        let rhs = DVector::from_element(50, 1.0);

        match IterativeSolver::new(1e-14, 3).solve(&matrix, &rhs) {
            Err(FemError::SolverDidNotConverge {
                iterations,
                residual,
            }) => {
                assert_eq!(iterations, 3);
                assert!(residual > 1e-14);
            }
            other => panic!("expected SolverDidNotConverge, got {:?}", other),
        }
    }

    #[test]
    fn invalid_systems() {
        let matrix = laplacian_1d(3);
        assert!(matches!(
            IterativeSolver::default().solve(&matrix, &DVector::from_element(4, 1.0)),
            Err(FemError::DofMismatch(_))
        ));

        let mut coo = CooMatrix::new(2, 2);
        coo.push(0, 0, 1.0);
        coo.push(0, 1, 1.0);
        coo.push(1, 0, 1.0);
        let singular = CscMatrix::from(&coo);
        assert!(matches!(
            IterativeSolver::default().solve(&singular, &DVector::from_element(2, 1.0)),
            Err(FemError::SingularSystem(_))
        ));
    }

    #[test]
    fn complex_hermitian_system() {
        let i = Complex64::i();
        let one = Complex64::new(1.0, 0.0);
        let mut coo = CooMatrix::new(2, 2);
        coo.push(0, 0, 4.0 * one);
        coo.push(0, 1, i);
        coo.push(1, 0, -i);
        coo.push(1, 1, 3.0 * one);
        let matrix = CscMatrix::from(&coo);

        let expected = DVector::from_vec(vec![Complex64::new(1.0, -1.0), Complex64::new(0.5, 2.0)]);
        let rhs = spmv(&matrix, &expected).unwrap();

        let x = IterativeSolver::new(1e-12, 50).solve(&matrix, &rhs).unwrap();
        assert!((x - expected).norm() < 1e-10);
    }
}
