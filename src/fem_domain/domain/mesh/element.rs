use super::material::Material;
use super::node::NodeSet;
use crate::error::{FemError, Result};
use crate::fem_domain::basis::{ShapeFunction, Topology};
use crate::FemValue;
use nalgebra::{DMatrix, DVector};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Jacobians whose determinant is smaller than this (relative to the product of their row norms) are considered singular
pub const SINGULARITY_TOLERANCE: f64 = 1e-12;

/// The `Element`s are the basic geometric unit of the Mesh.
///
/// Elements are responsible for:
/// * Keeping the ordered list of Node ids (this order defines the local DoF ordering)
/// * Mapping derivatives between Reference and Physical Space
/// * Keeping track of their material in their portion of the Mesh
///
/// Nodes are referenced by id and resolved through a [NodeSet] when needed.
#[derive(Debug, Clone)]
pub struct Element {
    pub id: usize,
    node_ids: SmallVec<[usize; 4]>,
    shape_fn: Arc<dyn ShapeFunction>,
    material: Option<Arc<Material>>,
    coordinates: Option<DMatrix<f64>>,
}

/// Jacobian and Global Shape Function Derivatives computed at a single point
#[derive(Debug, Clone)]
pub struct Derivatives {
    /// `dN · X` (reference dim × spatial dim)
    pub jacobian: DMatrix<f64>,
    pub determinant: f64,
    /// `J⁻¹ · dN` (spatial dim × number of Nodes)
    pub global_derivatives: DMatrix<f64>,
}

impl Element {
    /// Create an Element over a list of Node ids. The number of Nodes must match the Shape Function.
    pub fn new(id: usize, node_ids: &[usize], shape_fn: Arc<dyn ShapeFunction>) -> Result<Self> {
        if node_ids.len() != shape_fn.num_nodes() {
            return Err(FemError::NodeCountMismatch {
                element_id: id,
                expected: shape_fn.num_nodes(),
                received: node_ids.len(),
            });
        }

        Ok(Self {
            id,
            node_ids: SmallVec::from_slice(node_ids),
            shape_fn,
            material: None,
            coordinates: None,
        })
    }

    pub fn with_material(mut self, material: Arc<Material>) -> Self {
        self.material = Some(material);
        self
    }

    pub fn set_material(&mut self, material: Arc<Material>) {
        self.material = Some(material);
    }

    pub fn material(&self) -> Option<&Material> {
        self.material.as_deref()
    }

    pub fn topology(&self) -> Topology {
        self.shape_fn.topology()
    }

    pub fn shape_function(&self) -> &dyn ShapeFunction {
        self.shape_fn.as_ref()
    }

    pub fn node_ids(&self) -> &[usize] {
        &self.node_ids
    }

    pub fn num_nodes(&self) -> usize {
        self.node_ids.len()
    }

    /// Build the coordinates matrix (one row per Node, one column per spatial dimension) from the Nodes in local order
    pub fn generate_coordinates_matrix<T: FemValue>(&mut self, nodes: &NodeSet<T>) -> Result<()> {
        let first = nodes.get(self.node_ids[0])?;
        let dim = first.dimension();

        let mut coordinates = DMatrix::zeros(self.node_ids.len(), dim);
        for (r, node_id) in self.node_ids.iter().enumerate() {
            let node = nodes.get(*node_id)?;
            if node.dimension() != dim {
                return Err(FemError::InvalidDimension {
                    node_id: *node_id,
                    dim: node.dimension(),
                });
            }
            for (c, x) in node.coords().iter().enumerate() {
                coordinates[(r, c)] = *x;
            }
        }

        self.coordinates = Some(coordinates);
        Ok(())
    }

    pub fn coordinates_matrix(&self) -> Result<&DMatrix<f64>> {
        self.coordinates
            .as_ref()
            .ok_or(FemError::MissingGeometry(self.id))
    }

    pub fn has_geometry(&self) -> bool {
        self.coordinates.is_some()
    }

    /// Evaluate the Shape Functions at a point in the reference domain
    pub fn shape_functions(&self, local_coords: &[f64]) -> Result<DVector<f64>> {
        self.shape_fn.evaluate(local_coords)
    }

    /// Map a point in the reference domain into physical space (`Nᵀ · X`)
    pub fn physical_point(&self, local_coords: &[f64]) -> Result<DVector<f64>> {
        let coordinates = self.coordinates_matrix()?;
        let n = self.shape_fn.evaluate(local_coords)?;
        Ok(coordinates.tr_mul(&n))
    }

    /// `J = dN(local) · X`
    pub fn jacobian(&self, local_coords: &[f64]) -> Result<DMatrix<f64>> {
        let coordinates = self.coordinates_matrix()?;
        Ok(self.shape_fn.evaluate_derivatives(local_coords)? * coordinates)
    }

    /// Shape Function derivatives with respect to the physical coordinates: `J⁻¹ · dN(local)`
    pub fn global_shape_derivatives(&self, local_coords: &[f64]) -> Result<DMatrix<f64>> {
        Ok(self.derivatives(local_coords)?.global_derivatives)
    }

    /// Compute the Jacobian, its determinant and the Global Shape Function derivatives from a single evaluation of `dN`
    pub fn derivatives(&self, local_coords: &[f64]) -> Result<Derivatives> {
        let coordinates = self.coordinates_matrix()?;
        let local_derivatives = self.shape_fn.evaluate_derivatives(local_coords)?;
        let jacobian = &local_derivatives * coordinates;

        let (determinant, inverse) = self.checked_inverse(&jacobian)?;

        Ok(Derivatives {
            global_derivatives: inverse * local_derivatives,
            jacobian,
            determinant,
        })
    }

    fn checked_inverse(&self, jacobian: &DMatrix<f64>) -> Result<(f64, DMatrix<f64>)> {
        if !jacobian.is_square() {
            return Err(FemError::NonSquareJacobian {
                element_id: self.id,
                rows: jacobian.nrows(),
                cols: jacobian.ncols(),
            });
        }

        let determinant = jacobian.determinant();
        let scale: f64 = jacobian.row_iter().map(|row| row.norm()).product();

        if !determinant.is_finite() || determinant.abs() <= SINGULARITY_TOLERANCE * scale {
            return Err(FemError::SingularJacobian {
                element_id: self.id,
                determinant,
            });
        }

        jacobian
            .clone()
            .try_inverse()
            .map(|inverse| (determinant, inverse))
            .ok_or(FemError::SingularJacobian {
                element_id: self.id,
                determinant,
            })
    }

    /// Concatenate each Node's DoF ids in local Node order. This is the local-to-global map used during assembly.
    pub fn global_dof_indices<T: FemValue>(&self, nodes: &NodeSet<T>) -> Result<Vec<usize>> {
        let mut dofs = Vec::with_capacity(self.node_ids.len() * 2);
        for node_id in self.node_ids.iter() {
            dofs.extend_from_slice(nodes.get(*node_id)?.dofs());
        }
        Ok(dofs)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Element {} | {} | Nodes: [", self.id, self.topology())?;
        for (i, node_id) in self.node_ids.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", node_id)?;
        }
        write!(f, "]")?;
        if let Some(material) = &self.material {
            write!(f, " | Material: {}", material.name)?;
        }
        Ok(())
    }
}
