/// Dense LU solve for small systems
pub mod dense_solve;
/// Jacobi-preconditioned Conjugate Gradient
pub mod iterative;

use crate::error::{FemError, Result};
use crate::FemValue;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CscMatrix};
use rayon::prelude::*;
use std::sync::mpsc::channel;

/// Solves `A x = b` for a sparse, (Hermitian) positive-definite `A`
pub trait EquationSolver<T: FemValue>: Send + Sync {
    fn solve(&self, matrix: &CscMatrix<T>, rhs: &DVector<T>) -> Result<DVector<T>>;

    /// Short name used in log output
    fn name(&self) -> &'static str;
}

/// Local stiffness matrix and load vector of a single Element, along with its local-to-global DoF map
#[derive(Debug, Clone)]
pub struct ElementContribution<T> {
    pub element_id: usize,
    dofs: Vec<usize>,
    stiffness: DMatrix<T>,
    rhs: DVector<T>,
}

impl<T: FemValue> ElementContribution<T> {
    /// Checks that the matrix and vector dimensions agree with the DoF map
    pub fn new(
        element_id: usize,
        dofs: Vec<usize>,
        stiffness: DMatrix<T>,
        rhs: DVector<T>,
    ) -> Result<Self> {
        let n = dofs.len();
        if stiffness.nrows() != n || stiffness.ncols() != n || rhs.len() != n {
            return Err(FemError::DofMismatch(format!(
                "element {} maps {} dofs; received a {}x{} stiffness matrix and a rhs of length {}",
                element_id,
                n,
                stiffness.nrows(),
                stiffness.ncols(),
                rhs.len()
            )));
        }

        Ok(Self {
            element_id,
            dofs,
            stiffness,
            rhs,
        })
    }

    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }

    pub fn stiffness(&self) -> &DMatrix<T> {
        &self.stiffness
    }

    pub fn rhs(&self) -> &DVector<T> {
        &self.rhs
    }
}

/// Global sparse system under assembly.
///
/// Contributions are accumulated as triplets; overlapping entries are summed when the
/// system is compressed with [GlobalSystem::into_parts].
#[derive(Debug, Clone)]
pub struct GlobalSystem<T> {
    matrix: CooMatrix<T>,
    rhs: DVector<T>,
    num_contributions: usize,
}

impl<T: FemValue> GlobalSystem<T> {
    pub fn new(num_dofs: usize) -> Self {
        Self {
            matrix: CooMatrix::new(num_dofs, num_dofs),
            rhs: DVector::zeros(num_dofs),
            num_contributions: 0,
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.rhs.len()
    }

    /// Number of Element contributions consumed so far
    pub fn num_contributions(&self) -> usize {
        self.num_contributions
    }

    /// Number of (not yet summed) stored triplets
    pub fn num_triplets(&self) -> usize {
        self.matrix.nnz()
    }

    /// Scatter one Element's matrix and vector into the global system
    pub fn add_contribution(&mut self, contribution: &ElementContribution<T>) -> Result<()> {
        let num_dofs = self.num_dofs();
        if let Some(dof) = contribution.dofs.iter().find(|dof| **dof >= num_dofs) {
            return Err(FemError::DofMismatch(format!(
                "element {} references global dof {}; the system only has {}",
                contribution.element_id, dof, num_dofs
            )));
        }

        for (i, row) in contribution.dofs.iter().enumerate() {
            self.rhs[*row] += contribution.rhs[i];
            for (j, col) in contribution.dofs.iter().enumerate() {
                let value = contribution.stiffness[(i, j)];
                if value != T::zero() {
                    self.matrix.push(*row, *col, value);
                }
            }
        }
        self.num_contributions += 1;
        Ok(())
    }

    /// Consume Element contributions in order, stopping at the first failure
    pub fn accumulate<I>(&mut self, contributions: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<ElementContribution<T>>>,
    {
        for contribution in contributions {
            self.add_contribution(&contribution?)?;
        }
        Ok(())
    }

    /// Compute Element contributions over the Rayon Global Threadpool.
    ///
    /// Results are sent over a channel and scattered by the calling thread, so the global
    /// storage is only ever written sequentially.
    pub fn par_accumulate<I>(&mut self, contributions: I) -> Result<()>
    where
        I: IntoParallelIterator<Item = Result<ElementContribution<T>>>,
    {
        let (sender, receiver) = channel();

        contributions
            .into_par_iter()
            .for_each_with(sender, |s, contribution| {
                s.send(contribution).expect(
                    "Failed to send element contribution over MPSC channel; cannot assemble system!",
                )
            });

        receiver
            .iter()
            .try_for_each(|contribution| self.add_contribution(&contribution?))
    }

    /// Compress the matrix into CSC form (summing duplicate entries) and return it with the right-hand side
    pub fn into_parts(self) -> (CscMatrix<T>, DVector<T>) {
        (CscMatrix::from(&self.matrix), self.rhs)
    }
}

/// Sparse matrix-vector product `A x` with a dimension check
pub fn spmv<T: FemValue>(matrix: &CscMatrix<T>, x: &DVector<T>) -> Result<DVector<T>> {
    if matrix.ncols() != x.len() {
        return Err(FemError::DofMismatch(format!(
            "cannot multiply a {}x{} matrix with a vector of length {}",
            matrix.nrows(),
            matrix.ncols(),
            x.len()
        )));
    }

    Ok(matrix * x)
}

/// Diagonal of a square sparse matrix (missing entries are zero)
pub(crate) fn diagonal<T: FemValue>(matrix: &CscMatrix<T>) -> DVector<T> {
    DVector::from_iterator(
        matrix.ncols(),
        (0..matrix.ncols()).map(|j| {
            matrix
                .get_entry(j, j)
                .map(|entry| entry.into_value())
                .unwrap_or_else(T::zero)
        }),
    )
}

pub(crate) fn check_square_system<T: FemValue>(
    matrix: &CscMatrix<T>,
    rhs: &DVector<T>,
) -> Result<()> {
    if matrix.nrows() != matrix.ncols() || matrix.nrows() != rhs.len() {
        return Err(FemError::DofMismatch(format!(
            "cannot solve a {}x{} system with a right-hand side of length {}",
            matrix.nrows(),
            matrix.ncols(),
            rhs.len()
        )));
    }
    Ok(())
}
