use crate::error::{FemError, Result};
use json::JsonValue;
use std::fs::read_to_string;

/// Default number of Gauss-Legendre points along each reference direction
pub const DEFAULT_QUADRATURE_ORDER: usize = 3;
/// Default relative residual tolerance for iterative solvers
pub const DEFAULT_TOLERANCE: f64 = 1e-6;
/// Default iteration cap for iterative solvers
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Settings used to integrate, assemble and solve a problem
#[derive(Debug, Clone, PartialEq)]
pub struct FemConfig {
    /// Number of 1D Gauss-Legendre points used to build each Element's quadrature rule
    pub quadrature_order: usize,
    /// Evaluate Element contributions over the Rayon Global Threadpool
    pub parallel_assembly: bool,
    pub solver: SolverConfig,
}

/// Convergence settings for iterative solvers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Relative residual (‖r‖ / ‖b‖) required for convergence
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for FemConfig {
    fn default() -> Self {
        Self {
            quadrature_order: DEFAULT_QUADRATURE_ORDER,
            parallel_assembly: true,
            solver: SolverConfig::default(),
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl FemConfig {
    pub fn with_quadrature_order(mut self, order: usize) -> Self {
        self.quadrature_order = order;
        self
    }

    pub fn with_parallel_assembly(mut self, parallel: bool) -> Self {
        self.parallel_assembly = parallel;
        self
    }

    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Read a configuration from a JSON file with the following format (all keys are optional)
    ///
    /// ```JSON
    /// {
    ///     "quadrature_order": 3,
    ///     "parallel_assembly": true,
    ///     "solver": {
    ///         "tolerance": 1e-6,
    ///         "max_iterations": 1000
    ///     }
    /// }
    /// ```
    pub fn from_file(path: impl AsRef<str>) -> Result<Self> {
        let contents = read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Parse a configuration from a JSON string. Missing keys keep their default values
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let parsed = json::parse(contents)
            .map_err(|err| FemError::Config(format!("unable to parse JSON: {}", err)))?;
        Self::from_json(&parsed)
    }

    pub fn from_json(value: &JsonValue) -> Result<Self> {
        if !value.is_object() {
            return Err(FemError::Config(
                "configuration must be a JSON object".to_string(),
            ));
        }

        let mut config = Self::default();

        if let Some(order) = optional(value, "quadrature_order", JsonValue::as_usize)? {
            if order == 0 {
                return Err(FemError::Config(
                    "quadrature_order must be at least 1".to_string(),
                ));
            }
            config.quadrature_order = order;
        }
        if let Some(parallel) = optional(value, "parallel_assembly", JsonValue::as_bool)? {
            config.parallel_assembly = parallel;
        }

        let solver = &value["solver"];
        if !solver.is_null() {
            if !solver.is_object() {
                return Err(FemError::Config("'solver' must be a JSON object".to_string()));
            }
            if let Some(tolerance) = optional(solver, "tolerance", JsonValue::as_f64)? {
                if tolerance <= 0.0 {
                    return Err(FemError::Config(
                        "solver tolerance must be positive".to_string(),
                    ));
                }
                config.solver.tolerance = tolerance;
            }
            if let Some(max_iterations) = optional(solver, "max_iterations", JsonValue::as_usize)? {
                config.solver.max_iterations = max_iterations;
            }
        }

        Ok(config)
    }
}

fn optional<V>(
    object: &JsonValue,
    key: &'static str,
    extract: fn(&JsonValue) -> Option<V>,
) -> Result<Option<V>> {
    let member = &object[key];
    if member.is_null() {
        Ok(None)
    } else {
        extract(member)
            .map(Some)
            .ok_or_else(|| FemError::Config(format!("'{}' has an invalid value: {}", key, member)))
    }
}
