use super::mesh::node::NodeSet;
use crate::error::{FemError, Result};
use crate::FemValue;
use nalgebra::DVector;
use nalgebra_sparse::CscMatrix;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, trace};

/// Table of prescribed (Dirichlet) values, keyed by Node id and the Node's local DoF index
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryCondition<T = f64> {
    dirichlet: BTreeMap<usize, BTreeMap<usize, T>>,
}

impl<T: FemValue> BoundaryCondition<T> {
    pub fn new() -> Self {
        Self {
            dirichlet: BTreeMap::new(),
        }
    }

    /// Prescribe `value` for DoF `dof_index` of Node `node_id` (overwrites an existing constraint)
    pub fn set_dirichlet(&mut self, node_id: usize, dof_index: usize, value: T) {
        self.dirichlet
            .entry(node_id)
            .or_insert_with(BTreeMap::new)
            .insert(dof_index, value);
    }

    pub fn has_dirichlet(&self, node_id: usize, dof_index: usize) -> bool {
        self.dirichlet(node_id, dof_index).is_some()
    }

    pub fn dirichlet(&self, node_id: usize, dof_index: usize) -> Option<T> {
        self.dirichlet
            .get(&node_id)
            .and_then(|dofs| dofs.get(&dof_index))
            .copied()
    }

    /// Remove a constraint, returning its value.
    ///
    /// Removing the last constrained DoF of a Node removes the Node's entry entirely.
    pub fn remove_dirichlet(&mut self, node_id: usize, dof_index: usize) -> Option<T> {
        let dofs = self.dirichlet.get_mut(&node_id)?;
        let removed = dofs.remove(&dof_index);
        if dofs.is_empty() {
            self.dirichlet.remove(&node_id);
        }
        removed
    }

    /// Number of Nodes with at least one constrained DoF
    pub fn num_constrained_nodes(&self) -> usize {
        self.dirichlet.len()
    }

    /// Total number of constrained DoFs
    pub fn len(&self) -> usize {
        self.dirichlet.values().map(|dofs| dofs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.dirichlet.is_empty()
    }

    /// Iterate over `(node_id, dof_index, value)` in ascending Node id and DoF index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        self.dirichlet.iter().flat_map(|(node_id, dofs)| {
            dofs.iter()
                .map(move |(dof_index, value)| (*node_id, *dof_index, *value))
        })
    }

    /// Eliminate every constraint from an assembled symmetric system.
    ///
    /// For a constrained global DoF `g` with value `v`, each off-diagonal entry `a` at `(row, g)`
    /// is moved to the right-hand side (`rhs[row] -= a * v`) and zeroed together with its
    /// transpose `(g, row)`. The diagonal is kept and `rhs[g] = a_gg * v`, so the equation
    /// for `g` reads `x_g = v`. Symmetry of `matrix` is preserved.
    pub fn apply_dirichlet(
        &self,
        matrix: &mut CscMatrix<T>,
        rhs: &mut DVector<T>,
        nodes: &NodeSet<T>,
    ) -> Result<()> {
        let size = matrix.nrows();
        if matrix.ncols() != size || rhs.len() != size {
            return Err(FemError::DofMismatch(format!(
                "cannot constrain a {}x{} matrix with a right-hand side of length {}",
                matrix.nrows(),
                matrix.ncols(),
                rhs.len()
            )));
        }

        // every constraint is resolved and checked before the system is touched
        let mut constraints = Vec::with_capacity(self.len());
        for (node_id, dof_index, value) in self.iter() {
            let global_dof = nodes.get(node_id)?.dof(dof_index)?;
            if global_dof >= size {
                return Err(FemError::DofMismatch(format!(
                    "node {} dof {} maps to global dof {}; the system only has {}",
                    node_id, dof_index, global_dof, size
                )));
            }

            let diagonal = matrix
                .get_entry(global_dof, global_dof)
                .map(|entry| entry.into_value())
                .unwrap_or_else(T::zero);
            if diagonal == T::zero() {
                return Err(FemError::SingularSystem(format!(
                    "constrained global dof {} (node {}, dof {}) has a zero diagonal",
                    global_dof, node_id, dof_index
                )));
            }
            constraints.push((global_dof, diagonal, value));
        }

        // elimination only zeroes off-diagonal entries, so the checked diagonals stay valid
        for (global_dof, diagonal, value) in constraints {
            let column: Vec<(usize, T)> = {
                let col = matrix.col(global_dof);
                col.row_indices()
                    .iter()
                    .copied()
                    .zip(col.values().iter().copied())
                    .filter(|(row, entry)| *row != global_dof && *entry != T::zero())
                    .collect()
            };

            for (row, entry) in column {
                rhs[row] -= entry * value;
                zero_entry(matrix, row, global_dof);
                zero_entry(matrix, global_dof, row);
            }
            rhs[global_dof] = diagonal * value;
            trace!(global_dof, "eliminated dirichlet dof");
        }

        debug!(constrained_dofs = self.len(), "applied dirichlet conditions");
        Ok(())
    }
}

fn zero_entry<T: FemValue>(matrix: &mut CscMatrix<T>, row: usize, col: usize) {
    if let Some(nalgebra_sparse::SparseEntryMut::NonZero(entry)) = matrix.get_entry_mut(row, col) {
        *entry = T::zero();
    }
}

impl<T: FemValue> Default for BoundaryCondition<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FemValue> fmt::Display for BoundaryCondition<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Dirichlet BCs:")?;
        for (node_id, dof_index, value) in self.iter() {
            writeln!(f, "Node {}, DOF {} -> {}", node_id, dof_index, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fem_domain::domain::mesh::node::Node;
    use nalgebra::DMatrix;
    use nalgebra_sparse::CooMatrix;

    fn chain_nodes(n: usize) -> NodeSet {
        let mut nodes = NodeSet::new();
        for id in 0..n {
            nodes.push(Node::new(id, &[id as f64, 0.0], 1).unwrap()).unwrap();
        }
        nodes
    }

    /// Stiffness matrix of `n - 1` unit springs in series
    fn spring_chain(n: usize) -> CscMatrix<f64> {
        let mut coo = CooMatrix::new(n, n);
        for e in 0..n - 1 {
            coo.push(e, e, 1.0);
            coo.push(e + 1, e + 1, 1.0);
            coo.push(e, e + 1, -1.0);
            coo.push(e + 1, e, -1.0);
        }
        CscMatrix::from(&coo)
    }

    fn dense(matrix: &CscMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from(matrix)
    }

    #[test]
    fn table_operations() {
        let mut bc: BoundaryCondition = BoundaryCondition::new();
        assert!(bc.is_empty());

        bc.set_dirichlet(1, 0, 0.0);
        bc.set_dirichlet(1, 1, 2.5);
        bc.set_dirichlet(0, 0, -1.0);
        assert_eq!(bc.len(), 3);
        assert_eq!(bc.num_constrained_nodes(), 2);
        assert!(bc.has_dirichlet(1, 1));
        assert_eq!(bc.dirichlet(1, 1), Some(2.5));
        assert_eq!(bc.dirichlet(4, 0), None);

        bc.set_dirichlet(1, 1, 3.0);
        assert_eq!(bc.dirichlet(1, 1), Some(3.0));

        let ordered: Vec<(usize, usize, f64)> = bc.iter().collect();
        assert_eq!(ordered, vec![(0, 0, -1.0), (1, 0, 0.0), (1, 1, 3.0)]);
    }

    #[test]
    fn removing_last_dof_removes_node() {
        let mut bc: BoundaryCondition = BoundaryCondition::new();
        bc.set_dirichlet(2, 0, 1.0);
        bc.set_dirichlet(2, 1, 1.0);

        assert_eq!(bc.remove_dirichlet(2, 0), Some(1.0));
        assert_eq!(bc.num_constrained_nodes(), 1);
        assert_eq!(bc.remove_dirichlet(2, 0), None);

        assert_eq!(bc.remove_dirichlet(2, 1), Some(1.0));
        assert_eq!(bc.num_constrained_nodes(), 0);
        assert!(bc.is_empty());
        assert_eq!(bc.remove_dirichlet(7, 0), None);
    }

    #[test]
    fn elimination_preserves_symmetry() {
        let nodes = chain_nodes(4);
        let mut matrix = spring_chain(4);
        let mut rhs = DVector::from_vec(vec![0.0, 1.0, 2.0, 3.0]);

        let mut bc = BoundaryCondition::new();
        bc.set_dirichlet(0, 0, 2.0);
        bc.set_dirichlet(3, 0, -1.0);
        bc.apply_dirichlet(&mut matrix, &mut rhs, &nodes).unwrap();

        let a = dense(&matrix);
        assert_eq!(a, a.transpose());

        // constrained rows and columns are decoupled except for the diagonal
        for i in 0..4 {
            if i != 0 {
                assert_eq!(a[(0, i)], 0.0);
                assert_eq!(a[(i, 0)], 0.0);
            }
            if i != 3 {
                assert_eq!(a[(3, i)], 0.0);
                assert_eq!(a[(i, 3)], 0.0);
            }
        }
        assert_eq!(a[(0, 0)], 1.0);
        assert_eq!(a[(1, 1)], 2.0);
        assert_eq!(a[(1, 2)], -1.0);

        // rhs[row] -= a * v
        assert!((rhs[0] - 2.0).abs() < 1e-14);
        assert!((rhs[1] - (1.0 + 2.0)).abs() < 1e-14);
        assert!((rhs[2] - (2.0 - 1.0)).abs() < 1e-14);
        assert!((rhs[3] + 1.0).abs() < 1e-14);
    }

    #[test]
    fn constrained_solution_matches_prescribed_values() {
        let nodes = chain_nodes(5);
        let mut matrix = spring_chain(5);
        let mut rhs = DVector::zeros(5);

        let mut bc = BoundaryCondition::new();
        bc.set_dirichlet(0, 0, 1.0);
        bc.set_dirichlet(4, 0, 5.0);
        bc.apply_dirichlet(&mut matrix, &mut rhs, &nodes).unwrap();

        let x = dense(&matrix).lu().solve(&rhs).unwrap();
        for (i, expected) in [1.0, 2.0, 3.0, 4.0, 5.0].iter().enumerate() {
            assert!((x[i] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn unknown_nodes_and_dofs_are_errors() {
        let nodes = chain_nodes(3);
        let mut matrix = spring_chain(3);
        let mut rhs = DVector::zeros(3);

        let mut bc = BoundaryCondition::new();
        bc.set_dirichlet(8, 0, 1.0);
        assert!(matches!(
            bc.apply_dirichlet(&mut matrix, &mut rhs, &nodes),
            Err(FemError::UnknownNode(8))
        ));

        let mut bc = BoundaryCondition::new();
        bc.set_dirichlet(1, 1, 1.0);
        assert!(matches!(
            bc.apply_dirichlet(&mut matrix, &mut rhs, &nodes),
            Err(FemError::InvalidIndex { .. })
        ));

        let mut short_rhs = DVector::zeros(2);
        assert!(matches!(
            BoundaryCondition::new().apply_dirichlet(&mut matrix, &mut short_rhs, &nodes),
            Err(FemError::DofMismatch(_))
        ));
    }

    #[test]
    fn zero_diagonal_is_singular() {
        let nodes = chain_nodes(2);
        let mut coo = CooMatrix::new(2, 2);
        coo.push(1, 1, 1.0);
        let mut matrix = CscMatrix::from(&coo);
        let mut rhs = DVector::zeros(2);

        let mut bc = BoundaryCondition::new();
        bc.set_dirichlet(0, 0, 1.0);
        assert!(matches!(
            bc.apply_dirichlet(&mut matrix, &mut rhs, &nodes),
            Err(FemError::SingularSystem(_))
        ));
    }

    #[test]
    fn failed_elimination_leaves_system_untouched() {
        let nodes = chain_nodes(3);
        let mut coo = CooMatrix::new(3, 3);
        coo.push(0, 0, 2.0);
        coo.push(0, 1, -1.0);
        coo.push(1, 0, -1.0);
        coo.push(1, 1, 2.0);
        coo.push(1, 2, -1.0);
        coo.push(2, 1, -1.0);
        let mut matrix = CscMatrix::from(&coo);
        let mut rhs = DVector::from_element(3, 1.0);
        let (matrix_before, rhs_before) = (matrix.clone(), rhs.clone());

        // node 0 can be eliminated, node 2 has no diagonal entry
        let mut bc = BoundaryCondition::new();
        bc.set_dirichlet(0, 0, 3.0);
        bc.set_dirichlet(2, 0, 1.0);
        assert!(matches!(
            bc.apply_dirichlet(&mut matrix, &mut rhs, &nodes),
            Err(FemError::SingularSystem(_))
        ));
        assert_eq!(matrix, matrix_before);
        assert_eq!(rhs, rhs_before);
    }

    #[test]
    fn display_format() {
        let mut bc: BoundaryCondition = BoundaryCondition::new();
        bc.set_dirichlet(0, 1, 0.5);
        assert_eq!(bc.to_string(), "Dirichlet BCs:\nNode 0, DOF 1 -> 0.5\n");
    }
}
