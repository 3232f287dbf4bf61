/// A Finite Element: connectivity, Shape Function and geometric mappings
pub mod element;
/// Material property storage
pub mod material;
/// A Point in Real Space carrying Degrees of Freedom
pub mod node;

use super::boundary::BoundaryCondition;
use crate::error::{FemError, Result};
use crate::FemValue;
use element::Element;
use nalgebra::DVector;
use node::{Node, NodeSet};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

#[cfg(feature = "json_export")]
use json::{object, JsonValue};
#[cfg(feature = "json_export")]
use std::fs::File;
#[cfg(feature = "json_export")]
use std::io::BufWriter;

/// External collaborator responsible for producing a Mesh's Nodes and Elements (ex: a file reader).
///
/// Node ids must be unique and Elements may only reference Nodes produced by the same source.
pub trait MeshSource<T: FemValue> {
    fn nodes(&self) -> Result<Vec<Node<T>>>;
    fn elements(&self) -> Result<Vec<Element>>;
}

/// Owner of the Nodes, Elements and Boundary Conditions of a problem.
///
/// Also responsible for numbering the global Degrees of Freedom.
#[derive(Debug, Clone)]
pub struct Mesh<T = f64> {
    nodes: NodeSet<T>,
    elements: Vec<Element>,
    element_positions: BTreeMap<usize, usize>,
    boundary_condition: BoundaryCondition<T>,
    num_dofs: Option<usize>,
}

impl<T: FemValue> Mesh<T> {
    /// Construct a completely empty Mesh
    pub fn new() -> Self {
        Self {
            nodes: NodeSet::new(),
            elements: Vec::new(),
            element_positions: BTreeMap::new(),
            boundary_condition: BoundaryCondition::new(),
            num_dofs: None,
        }
    }

    /// Construct a Mesh from the Nodes and Elements provided by a [MeshSource]
    pub fn load_from(source: &impl MeshSource<T>) -> Result<Self> {
        let mut mesh = Self::new();
        for node in source.nodes()? {
            mesh.add_node(node)?;
        }
        for element in source.elements()? {
            mesh.add_element(element)?;
        }
        debug!(
            nodes = mesh.nodes.len(),
            elements = mesh.elements.len(),
            "loaded mesh"
        );
        Ok(mesh)
    }

    /// Append a Node. Invalidates any existing global DoF numbering.
    pub fn add_node(&mut self, node: Node<T>) -> Result<()> {
        self.nodes.push(node)?;
        self.num_dofs = None;
        Ok(())
    }

    /// Append an Element. All of its Nodes must already be in the Mesh.
    pub fn add_element(&mut self, element: Element) -> Result<()> {
        if self.element_positions.contains_key(&element.id) {
            return Err(FemError::DuplicateElement(element.id));
        }
        if let Some(missing) = element
            .node_ids()
            .iter()
            .find(|node_id| !self.nodes.contains(**node_id))
        {
            return Err(FemError::UnknownNode(*missing));
        }

        self.element_positions
            .insert(element.id, self.elements.len());
        self.elements.push(element);
        Ok(())
    }

    pub fn nodes(&self) -> &NodeSet<T> {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> Result<&Node<T>> {
        self.nodes.get(id)
    }

    /// Mutable access to a Node's DoF ids and values.
    ///
    /// DoF ids changed by hand bypass the global numbering; [Mesh::assign_solution] then fails with
    /// `DofMismatch` until [Mesh::generate_global_dofs] is called again.
    pub fn node_mut(&mut self, id: usize) -> Result<&mut Node<T>> {
        self.nodes.get_mut(id)
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, id: usize) -> Result<&Element> {
        self.element_positions
            .get(&id)
            .map(|&pos| &self.elements[pos])
            .ok_or_else(|| FemError::invalid_index("element", id, self.elements.len()))
    }

    pub fn boundary_condition(&self) -> &BoundaryCondition<T> {
        &self.boundary_condition
    }

    pub fn boundary_condition_mut(&mut self) -> &mut BoundaryCondition<T> {
        &mut self.boundary_condition
    }

    /// Sort the Nodes by ascending id
    pub fn sort_nodes(&mut self) -> &NodeSet<T> {
        self.nodes.sort_by_id();
        &self.nodes
    }

    /// Sort the Nodes, then assign DoF ids `0..total` sequentially, visiting each Node's DoF slots in order.
    ///
    /// Returns the total number of DoFs. Any previous numbering is replaced.
    pub fn generate_global_dofs(&mut self) -> usize {
        self.sort_nodes();

        let mut dof_counter = 0;
        for node in self.nodes.iter_mut() {
            dof_counter = node.number_dofs_from(dof_counter);
        }

        debug!(
            nodes = self.nodes.len(),
            dofs = dof_counter,
            "generated global dofs"
        );
        self.num_dofs = Some(dof_counter);
        dof_counter
    }

    /// Number of global DoFs, if the current numbering is valid
    pub fn num_dofs(&self) -> Option<usize> {
        self.num_dofs
    }

    /// Build the coordinates matrix of every Element
    pub fn generate_coordinate_matrices(&mut self) -> Result<()> {
        let nodes = &self.nodes;
        for element in self.elements.iter_mut() {
            element.generate_coordinates_matrix(nodes)?;
        }
        Ok(())
    }

    /// Global DoF ids of an Element's Nodes (in local Node order)
    pub fn element_dofs(&self, element: &Element) -> Result<Vec<usize>> {
        element.global_dof_indices(&self.nodes)
    }

    /// Copy a solution vector back onto the Nodes, following the sequential order used by [Mesh::generate_global_dofs]
    pub fn assign_solution(&mut self, solution: &DVector<T>) -> Result<()> {
        let num_dofs = self.num_dofs.ok_or(FemError::DofsNotNumbered)?;
        if solution.len() != num_dofs {
            return Err(FemError::DofMismatch(format!(
                "solution has {} entries; the mesh has {} dofs",
                solution.len(),
                num_dofs
            )));
        }

        // DoF ids relabeled through `node_mut` no longer follow the sequential numbering
        let mut dof_counter = 0;
        for node in self.nodes.iter() {
            for dof in node.dofs() {
                if *dof != dof_counter {
                    return Err(FemError::DofMismatch(format!(
                        "node {} holds dof id {} where the sequential numbering expects {}",
                        node.id(),
                        dof,
                        dof_counter
                    )));
                }
                dof_counter += 1;
            }
        }

        let mut dof_counter = 0;
        for node in self.nodes.iter_mut() {
            for index in 0..node.num_dofs() {
                node.set_value(index, solution[dof_counter])?;
                dof_counter += 1;
            }
        }
        Ok(())
    }

    /// Produce a Json Object that describes the Nodes (including their solved values) and Elements
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        let nodes: Vec<JsonValue> = self
            .nodes
            .iter()
            .map(|node| {
                let (values, values_im): (Vec<f64>, Vec<f64>) = node
                    .values()
                    .iter()
                    .map(|v| crate::split_value(*v))
                    .unzip();
                object! {
                    "id": node.id(),
                    "coords": node.coords().to_vec(),
                    "dofs": node.dofs().to_vec(),
                    "values": values,
                    "values_im": values_im,
                }
            })
            .collect();

        let elements: Vec<JsonValue> = self
            .elements
            .iter()
            .map(|element| {
                object! {
                    "id": element.id,
                    "topology": element.topology().to_string(),
                    "node_ids": element.node_ids().to_vec(),
                    "material": element.material().map(|m| m.name.clone()),
                }
            })
            .collect();

        object! {
            "Nodes": nodes,
            "Elements": elements,
        }
    }

    /// Print the mesh to a JSON file specified by path.
    #[cfg(feature = "json_export")]
    pub fn export_to_json(&self, path: impl AsRef<str>) -> Result<()> {
        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(&f);
        self.to_json().write_pretty(&mut w, 4)?;
        Ok(())
    }
}

impl<T: FemValue> Default for Mesh<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FemValue> fmt::Display for Mesh<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Mesh Information:")?;
        writeln!(f, "Total Nodes: {}", self.nodes.len())?;
        writeln!(f, "Total Elements: {}", self.elements.len())?;
        writeln!(f, "Nodes:")?;
        for node in self.nodes.iter() {
            writeln!(f, "{}", node)?;
        }
        writeln!(f, "Elements:")?;
        for element in self.elements.iter() {
            writeln!(f, "{}", element)?;
        }
        write!(f, "{}", self.boundary_condition)
    }
}
