/// Essential (Dirichlet) constraint table and its elimination from an assembled system
pub mod boundary;
/// Nodes, Elements, Materials and the Mesh that owns them
pub mod mesh;
