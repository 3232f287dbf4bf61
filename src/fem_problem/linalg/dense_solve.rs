use super::{check_square_system, EquationSolver};
use crate::error::{FemError, Result};
use crate::FemValue;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;
use tracing::debug;

/// Largest system the dense solver will accept
pub const MAX_DENSE_SIZE: usize = 1000;

/// This solver is only recommended in scenarios where the problem size is small
///
/// The sparse matrix is cast to a dense matrix object and factored with Nalgebra's LU Decomposition,
/// which uses a very large amount of memory when the system is large.
///
/// For larger problems the [IterativeSolver](super::iterative::IterativeSolver) is recommended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DenseSolver;

impl<T: FemValue> EquationSolver<T> for DenseSolver {
    fn solve(&self, matrix: &CscMatrix<T>, rhs: &DVector<T>) -> Result<DVector<T>> {
        check_square_system(matrix, rhs)?;
        if rhs.len() > MAX_DENSE_SIZE {
            return Err(FemError::SystemTooLarge {
                max: MAX_DENSE_SIZE,
                received: rhs.len(),
            });
        }

        let dense = DMatrix::from(matrix);
        let solution = dense.lu().solve(rhs).ok_or_else(|| {
            FemError::SingularSystem("LU decomposition encountered a zero pivot".to_string())
        })?;

        debug!(unknowns = rhs.len(), "dense LU solve complete");
        Ok(solution)
    }

    fn name(&self) -> &'static str {
        "dense-lu"
    }
}
