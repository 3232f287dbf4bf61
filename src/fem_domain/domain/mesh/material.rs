use crate::error::{FemError, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Named collection of scalar material properties (ex: "conductivity", "density")
///
/// Properties are consumed by an [ElementFormulation](crate::ElementFormulation) when computing constitutive matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub id: usize,
    pub name: String,
    properties: BTreeMap<String, f64>,
}

impl Material {
    pub fn new(id: usize, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style variant of [Material::set_property]
    pub fn with_property(mut self, key: impl Into<String>, value: f64) -> Self {
        self.set_property(key, value);
        self
    }

    /// Insert or overwrite a property
    pub fn set_property(&mut self, key: impl Into<String>, value: f64) {
        self.properties.insert(key.into(), value);
    }

    /// Look up a property, failing if it was never set
    pub fn property(&self, key: &str) -> Result<f64> {
        self.properties
            .get(key)
            .copied()
            .ok_or_else(|| FemError::UnknownProperty {
                material: self.name.clone(),
                property: key.to_string(),
            })
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.properties.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Material {} ({})", self.id, self.name)?;
        for (key, value) in self.properties.iter() {
            writeln!(f, "\t{}: {}", key, value)?;
        }
        Ok(())
    }
}
