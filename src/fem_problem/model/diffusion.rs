use super::ElementFormulation;
use crate::error::{FemError, Result};
use crate::fem_domain::domain::mesh::element::Element;
use crate::fem_problem::integration::Quadrature;
use crate::FemValue;
use nalgebra::{DMatrix, DVector};

/// Material property holding the (isotropic) conductivity
pub const CONDUCTIVITY: &str = "conductivity";

/// Steady diffusion `-∇·(k∇u) = s` with one DoF per Node.
///
/// * Constitutive matrix: `k·I`, with `k` read from the Element's material
/// * Stiffness: `∫ ∇Nᵀ D ∇N |J| dΩ`
/// * Right-hand side: `∫ N s |J| dΩ` for a uniform source `s`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScalarDiffusion {
    pub source: f64,
}

impl ScalarDiffusion {
    pub fn new(source: f64) -> Self {
        Self { source }
    }

    /// `k·I`, sized by the dimension of the space the Element lives in
    pub fn element_constitutive(&self, element: &Element) -> Result<DMatrix<f64>> {
        let material = element
            .material()
            .ok_or_else(|| FemError::UnknownProperty {
                material: format!("<none assigned to element {}>", element.id),
                property: CONDUCTIVITY.to_string(),
            })?;
        let conductivity = material.property(CONDUCTIVITY)?;
        let dim = element.coordinates_matrix()?.ncols();

        Ok(DMatrix::identity(dim, dim) * conductivity)
    }
}

impl<T: FemValue> ElementFormulation<T> for ScalarDiffusion {
    fn element_constitutive(&self, element: &Element) -> Result<DMatrix<f64>> {
        ScalarDiffusion::element_constitutive(self, element)
    }

    fn element_stiffness(&self, element: &Element, quadrature: &Quadrature) -> Result<DMatrix<T>> {
        let d = ScalarDiffusion::element_constitutive(self, element)?;
        let n = element.num_nodes();

        let mut stiffness = DMatrix::zeros(n, n);
        for (point, weight) in quadrature.iter() {
            let derivatives = element.derivatives(point)?;
            let b = &derivatives.global_derivatives;
            stiffness += b.transpose() * &d * b * (weight * derivatives.determinant.abs());
        }

        Ok(stiffness.map(nalgebra::convert::<f64, T>))
    }

    fn element_rhs(&self, element: &Element, quadrature: &Quadrature) -> Result<DVector<T>> {
        let mut rhs = DVector::zeros(element.num_nodes());
        if self.source != 0.0 {
            for (point, weight) in quadrature.iter() {
                let determinant = element.derivatives(point)?.determinant;
                rhs += element.shape_functions(point)? * (self.source * weight * determinant.abs());
            }
        }

        Ok(rhs.map(nalgebra::convert::<f64, T>))
    }
}
