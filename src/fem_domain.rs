/// Structures and Traits for Shape Function Evaluation
pub mod basis;
/// Structures to define the geometric characteristics, connectivity and constraints of an FEM Domain
pub mod domain;
