use crate::error::{FemError, Result};
use crate::FemValue;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

/// A point in 2D or 3D space carrying one or more Degrees of Freedom.
///
/// The list of DoF ids and the list of field values always have the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<T = f64> {
    id: usize,
    coords: SmallVec<[f64; 3]>,
    dofs: SmallVec<[usize; 3]>,
    values: SmallVec<[T; 3]>,
}

impl<T: FemValue> Node<T> {
    /// Create a Node with `num_dofs` Degrees of Freedom.
    ///
    /// Provisional DoF ids are `id * num_dofs + i`; they are replaced by [Mesh::generate_global_dofs](super::Mesh::generate_global_dofs).
    pub fn new(id: usize, coords: &[f64], num_dofs: usize) -> Result<Self> {
        Self::with_offset(id, coords, num_dofs, 0)
    }

    /// Create a Node whose provisional DoF ids start at `global_offset + id * num_dofs`
    pub fn with_offset(
        id: usize,
        coords: &[f64],
        num_dofs: usize,
        global_offset: usize,
    ) -> Result<Self> {
        let dofs = (0..num_dofs)
            .map(|i| global_offset + id * num_dofs + i)
            .collect::<SmallVec<[usize; 3]>>();
        Self::with_dofs(id, coords, &dofs)
    }

    /// Create a Node with an explicit list of DoF ids
    pub fn with_dofs(id: usize, coords: &[f64], dofs: &[usize]) -> Result<Self> {
        if !(2..=3).contains(&coords.len()) {
            return Err(FemError::InvalidDimension {
                node_id: id,
                dim: coords.len(),
            });
        }

        Ok(Self {
            id,
            coords: SmallVec::from_slice(coords),
            dofs: SmallVec::from_slice(dofs),
            values: SmallVec::from_elem(T::zero(), dofs.len()),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn dimension(&self) -> usize {
        self.coords.len()
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }

    pub fn num_dofs(&self) -> usize {
        self.dofs.len()
    }

    /// Global id of the DoF at `index`
    pub fn dof(&self, index: usize) -> Result<usize> {
        self.dofs
            .get(index)
            .copied()
            .ok_or_else(|| FemError::invalid_index("dof", index, self.dofs.len()))
    }

    pub fn set_dof(&mut self, index: usize, dof_id: usize) -> Result<()> {
        let len = self.dofs.len();
        let dof = self
            .dofs
            .get_mut(index)
            .ok_or_else(|| FemError::invalid_index("dof", index, len))?;
        *dof = dof_id;
        Ok(())
    }

    /// Replace the full list of DoF ids. The number of DoFs cannot change.
    pub fn set_dofs(&mut self, dofs: &[usize]) -> Result<()> {
        if dofs.len() != self.dofs.len() {
            return Err(FemError::DofMismatch(format!(
                "node {} has {} dofs; cannot assign {} dof ids",
                self.id,
                self.dofs.len(),
                dofs.len()
            )));
        }
        self.dofs.copy_from_slice(dofs);
        Ok(())
    }

    /// Assign consecutive DoF ids starting at `first`. Returns the next free id.
    pub(crate) fn number_dofs_from(&mut self, first: usize) -> usize {
        for (i, dof) in self.dofs.iter_mut().enumerate() {
            *dof = first + i;
        }
        first + self.dofs.len()
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Result<T> {
        self.values
            .get(index)
            .copied()
            .ok_or_else(|| FemError::invalid_index("value", index, self.values.len()))
    }

    pub fn set_value(&mut self, index: usize, value: T) -> Result<()> {
        debug_assert_eq!(self.values.len(), self.dofs.len());
        let len = self.values.len();
        let slot = self
            .values
            .get_mut(index)
            .ok_or_else(|| FemError::invalid_index("value", index, len))?;
        *slot = value;
        Ok(())
    }
}

impl<T: FemValue> fmt::Display for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Node {} | Coordinates: (", self.id)?;
        write_separated(f, &self.coords)?;
        write!(f, ") | DOFs: [")?;
        write_separated(f, &self.dofs)?;
        write!(f, "] | Values: [")?;
        write_separated(f, &self.values)?;
        write!(f, "]")
    }
}

fn write_separated<V: fmt::Display>(f: &mut fmt::Formatter, items: &[V]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Node storage addressed by Node id.
///
/// Elements and Boundary Conditions refer to Nodes by id, so reordering or appending Nodes
/// never invalidates them.
#[derive(Debug, Clone)]
pub struct NodeSet<T = f64> {
    nodes: Vec<Node<T>>,
    positions: BTreeMap<usize, usize>,
}

impl<T: FemValue> NodeSet<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            positions: BTreeMap::new(),
        }
    }

    /// Append a Node. Fails if a Node with the same id already exists.
    pub fn push(&mut self, node: Node<T>) -> Result<()> {
        if self.positions.contains_key(&node.id) {
            return Err(FemError::DuplicateNode(node.id));
        }
        self.positions.insert(node.id, self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    pub fn get(&self, id: usize) -> Result<&Node<T>> {
        self.positions
            .get(&id)
            .map(|&pos| &self.nodes[pos])
            .ok_or(FemError::UnknownNode(id))
    }

    pub fn get_mut(&mut self, id: usize) -> Result<&mut Node<T>> {
        match self.positions.get(&id) {
            Some(&pos) => Ok(&mut self.nodes[pos]),
            None => Err(FemError::UnknownNode(id)),
        }
    }

    pub fn contains(&self, id: usize) -> bool {
        self.positions.contains_key(&id)
    }

    /// Sort the Nodes by ascending id
    pub fn sort_by_id(&mut self) {
        self.nodes.sort_by_key(|node| node.id);
        for (pos, node) in self.nodes.iter().enumerate() {
            self.positions.insert(node.id, pos);
        }
    }

    /// Iterate over the Nodes in storage order
    pub fn iter(&self) -> impl Iterator<Item = &Node<T>> + '_ {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node<T>> + '_ {
        self.nodes.iter_mut()
    }

    pub fn as_slice(&self) -> &[Node<T>] {
        &self.nodes
    }

    /// Total number of DoFs over all Nodes
    pub fn num_dofs(&self) -> usize {
        self.nodes.iter().map(|node| node.num_dofs()).sum()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<T: FemValue> Default for NodeSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    #[test]
    fn provisional_dof_ids() {
        let node: Node = Node::new(3, &[1.0, 2.0], 2).unwrap();
        assert_eq!(node.dofs(), &[6, 7]);
        assert_eq!(node.values(), &[0.0, 0.0]);

        let offset: Node = Node::with_offset(3, &[1.0, 2.0, 0.5], 2, 10).unwrap();
        assert_eq!(offset.dofs(), &[16, 17]);
        assert_eq!(offset.dimension(), 3);
    }

    #[test]
    fn explicit_dofs_and_updates() {
        let mut node: Node = Node::with_dofs(1, &[3.0, 4.0], &[2, 3]).unwrap();
        assert_eq!(node.num_dofs(), 2);

        node.set_dof(0, 4).unwrap();
        assert_eq!(node.dofs(), &[4, 3]);

        node.set_dofs(&[34, 56]).unwrap();
        assert_eq!(node.dofs(), &[34, 56]);
        assert_eq!(node.dof(1).unwrap(), 56);

        node.set_value(0, 0.1).unwrap();
        node.set_value(1, 0.05).unwrap();
        assert!((node.value(0).unwrap() - 0.1).abs() < 1e-15);
        assert!((node.value(1).unwrap() - 0.05).abs() < 1e-15);
    }

    #[test]
    fn invalid_indices_are_errors() {
        let mut node: Node = Node::new(0, &[1.0, 2.0], 2).unwrap();

        assert!(matches!(node.set_dof(2, 9), Err(FemError::InvalidIndex { .. })));
        assert!(matches!(node.value(5), Err(FemError::InvalidIndex { .. })));
        assert!(matches!(node.set_value(2, 1.0), Err(FemError::InvalidIndex { .. })));
        assert!(matches!(node.dof(2), Err(FemError::InvalidIndex { .. })));
        assert!(matches!(node.set_dofs(&[1, 2, 3]), Err(FemError::DofMismatch(_))));

        // nothing was modified
        assert_eq!(node.dofs(), &[0, 1]);
    }

    #[test]
    fn coordinates_must_be_2d_or_3d() {
        assert!(matches!(
            Node::<f64>::new(0, &[1.0], 1),
            Err(FemError::InvalidDimension { node_id: 0, dim: 1 })
        ));
        assert!(Node::<f64>::new(0, &[1.0, 2.0, 3.0, 4.0], 1).is_err());
    }

    #[test]
    fn display_format() {
        let mut node: Node = Node::with_dofs(0, &[1.0, 2.0], &[0, 1]).unwrap();
        node.set_value(0, 0.1).unwrap();
        node.set_value(1, 0.05).unwrap();

        assert_eq!(
            node.to_string(),
            "Node 0 | Coordinates: (1, 2) | DOFs: [0, 1] | Values: [0.1, 0.05]"
        );
    }

    #[test]
    fn complex_values() {
        let mut node: Node<Complex64> = Node::new(0, &[0.0, 0.0], 1).unwrap();
        node.set_value(0, Complex64::new(1.0, -2.0)).unwrap();
        assert_eq!(node.value(0).unwrap(), Complex64::new(1.0, -2.0));
    }

    #[test]
    fn node_set_lookup_survives_sorting() {
        let mut nodes: NodeSet = NodeSet::new();
        for id in [3, 0, 2, 1] {
            nodes.push(Node::new(id, &[id as f64, 0.0], 1).unwrap()).unwrap();
        }

        assert!(matches!(
            nodes.push(Node::new(2, &[9.0, 9.0], 1).unwrap()),
            Err(FemError::DuplicateNode(2))
        ));
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes.num_dofs(), 4);

        nodes.sort_by_id();
        let ids: Vec<usize> = nodes.iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);

        for id in 0..4 {
            assert_eq!(nodes.get(id).unwrap().coords()[0], id as f64);
        }
        assert!(matches!(nodes.get(4), Err(FemError::UnknownNode(4))));
        assert!(nodes.contains(3) && !nodes.contains(7));

        nodes.get_mut(1).unwrap().set_value(0, 2.5).unwrap();
        assert_eq!(nodes.as_slice()[1].value(0).unwrap(), 2.5);
    }
}
