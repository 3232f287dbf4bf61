/// Steady scalar diffusion (heat conduction, potential flow, ...)
pub mod diffusion;

use super::integration::Quadrature;
use super::linalg::{ElementContribution, EquationSolver, GlobalSystem};
use crate::config::FemConfig;
use crate::error::{FemError, Result};
use crate::fem_domain::basis::Topology;
use crate::fem_domain::domain::mesh::{element::Element, Mesh};
use crate::FemValue;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, info_span};

/// The four phases of a linear Finite Element analysis.
///
/// Phases must be invoked in order: assemble, constrain, solve, scatter.
pub trait PhysicsModel<T: FemValue> {
    /// Compute every Element's local system and scatter it into the global system
    fn assemble_global_system(&mut self) -> Result<()>;

    /// Eliminate the Mesh's Dirichlet conditions from the assembled system
    fn apply_boundary_condition(&mut self) -> Result<()>;

    fn solve(&mut self) -> Result<()>;

    /// Copy the solution back onto the Nodes in global DoF order
    fn assign_solution_to_nodes(&mut self) -> Result<()>;
}

/// Physics-specific Element computations used during assembly.
///
/// Element geometry (coordinate matrices) is generated before any of these are called.
pub trait ElementFormulation<T: FemValue>: Sync {
    /// Constitutive matrix `D` of an Element (ex: a conductivity or elasticity tensor)
    fn element_constitutive(&self, element: &Element) -> Result<DMatrix<f64>>;

    /// Local stiffness matrix, one row/column per local DoF
    fn element_stiffness(&self, element: &Element, quadrature: &Quadrature) -> Result<DMatrix<T>>;

    /// Local right-hand side, one entry per local DoF
    fn element_rhs(&self, element: &Element, quadrature: &Quadrature) -> Result<DVector<T>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Empty,
    Assembled,
    Constrained,
    Solved,
}

/// Linear static analysis of a [Mesh] for any [ElementFormulation] and [EquationSolver]
pub struct LinearModel<T, F, S> {
    config: FemConfig,
    mesh: Mesh<T>,
    formulation: F,
    solver: S,
    nodal_loads: BTreeMap<(usize, usize), T>,
    system: Option<(CscMatrix<T>, DVector<T>)>,
    solution: Option<DVector<T>>,
    phase: Phase,
}

impl<T, F, S> LinearModel<T, F, S>
where
    T: FemValue,
    F: ElementFormulation<T>,
    S: EquationSolver<T>,
{
    pub fn new(mesh: Mesh<T>, formulation: F, solver: S, config: FemConfig) -> Self {
        Self {
            config,
            mesh,
            formulation,
            solver,
            nodal_loads: BTreeMap::new(),
            system: None,
            solution: None,
            phase: Phase::Empty,
        }
    }

    pub fn mesh(&self) -> &Mesh<T> {
        &self.mesh
    }

    /// Mutable access to the Mesh. Discards any assembled system or solution.
    pub fn mesh_mut(&mut self) -> &mut Mesh<T> {
        self.reset();
        &mut self.mesh
    }

    pub fn into_mesh(self) -> Mesh<T> {
        self.mesh
    }

    pub fn config(&self) -> &FemConfig {
        &self.config
    }

    pub fn formulation(&self) -> &F {
        &self.formulation
    }

    /// Add a concentrated load to the right-hand side entry of a Node's DoF (accumulates with previous loads)
    pub fn add_nodal_load(&mut self, node_id: usize, dof_index: usize, value: T) {
        *self
            .nodal_loads
            .entry((node_id, dof_index))
            .or_insert_with(T::zero) += value;
        self.reset();
    }

    /// The assembled (and possibly constrained) global matrix and right-hand side
    pub fn system(&self) -> Option<(&CscMatrix<T>, &DVector<T>)> {
        self.system.as_ref().map(|(matrix, rhs)| (matrix, rhs))
    }

    pub fn solution(&self) -> Option<&DVector<T>> {
        self.solution.as_ref()
    }

    /// Number the DoFs (if needed) and run all four phases
    pub fn run(&mut self) -> Result<&DVector<T>> {
        let _span = info_span!("linear_model", solver = self.solver.name()).entered();

        if self.mesh.num_dofs().is_none() {
            self.mesh.generate_global_dofs();
        }
        self.assemble_global_system()?;
        self.apply_boundary_condition()?;
        self.solve()?;
        self.assign_solution_to_nodes()?;

        self.solution.as_ref().ok_or(FemError::WorkflowOrder(
            "solution was discarded before it could be returned",
        ))
    }

    fn reset(&mut self) {
        self.system = None;
        self.solution = None;
        self.phase = Phase::Empty;
    }

    fn quadrature_rules(&self) -> Result<HashMap<Topology, Quadrature>> {
        let mut rules = HashMap::new();
        for element in self.mesh.elements() {
            let topology = element.topology();
            if !rules.contains_key(&topology) {
                rules.insert(topology, topology.quadrature(self.config.quadrature_order)?);
            }
        }
        Ok(rules)
    }
}

impl<T, F, S> PhysicsModel<T> for LinearModel<T, F, S>
where
    T: FemValue,
    F: ElementFormulation<T>,
    S: EquationSolver<T>,
{
    fn assemble_global_system(&mut self) -> Result<()> {
        self.reset();
        let num_dofs = self.mesh.num_dofs().ok_or(FemError::DofsNotNumbered)?;
        self.mesh.generate_coordinate_matrices()?;
        let rules = self.quadrature_rules()?;

        let nodes = self.mesh.nodes();
        let formulation = &self.formulation;
        let contribution = |element: &Element| -> Result<ElementContribution<T>> {
            let quadrature = &rules[&element.topology()];
            ElementContribution::new(
                element.id,
                element.global_dof_indices(nodes)?,
                formulation.element_stiffness(element, quadrature)?,
                formulation.element_rhs(element, quadrature)?,
            )
        };

        let mut system = GlobalSystem::new(num_dofs);
        if self.config.parallel_assembly {
            system.par_accumulate(self.mesh.elements().par_iter().map(contribution))?;
        } else {
            system.accumulate(self.mesh.elements().iter().map(contribution))?;
        }
        let num_triplets = system.num_triplets();
        let (matrix, mut rhs) = system.into_parts();

        for ((node_id, dof_index), load) in self.nodal_loads.iter() {
            let dof = self.mesh.node(*node_id)?.dof(*dof_index)?;
            rhs[dof] += *load;
        }

        info!(
            dofs = num_dofs,
            elements = self.mesh.elements().len(),
            nonzeros = matrix.nnz(),
            "assembled global system"
        );
        debug!(
            triplets = num_triplets,
            nodal_loads = self.nodal_loads.len(),
            parallel = self.config.parallel_assembly,
            "assembly statistics"
        );

        self.system = Some((matrix, rhs));
        self.phase = Phase::Assembled;
        Ok(())
    }

    fn apply_boundary_condition(&mut self) -> Result<()> {
        if self.phase != Phase::Assembled {
            return Err(FemError::WorkflowOrder(
                "boundary conditions can only be applied to a freshly assembled system",
            ));
        }
        let (matrix, rhs) = self.system.as_mut().ok_or(FemError::WorkflowOrder(
            "the global system has not been assembled",
        ))?;

        let boundary_condition = self.mesh.boundary_condition();
        boundary_condition.apply_dirichlet(matrix, rhs, self.mesh.nodes())?;

        info!(
            constrained_dofs = boundary_condition.len(),
            "applied boundary conditions"
        );
        self.phase = Phase::Constrained;
        Ok(())
    }

    fn solve(&mut self) -> Result<()> {
        if self.phase != Phase::Constrained {
            return Err(FemError::WorkflowOrder(
                "boundary conditions must be applied before solving",
            ));
        }
        let (matrix, rhs) = self.system.as_ref().ok_or(FemError::WorkflowOrder(
            "the global system has not been assembled",
        ))?;

        let solution = self.solver.solve(matrix, rhs)?;
        info!(
            solver = self.solver.name(),
            unknowns = solution.len(),
            "solved global system"
        );

        self.solution = Some(solution);
        self.phase = Phase::Solved;
        Ok(())
    }

    fn assign_solution_to_nodes(&mut self) -> Result<()> {
        let solution = match (self.phase, self.solution.as_ref()) {
            (Phase::Solved, Some(solution)) => solution,
            _ => {
                return Err(FemError::WorkflowOrder(
                    "the system must be solved before assigning the solution",
                ))
            }
        };

        self.mesh.assign_solution(solution)?;
        debug!(nodes = self.mesh.nodes().len(), "assigned solution to nodes");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fem_domain::basis::shape_fns::Line2;
    use crate::fem_domain::domain::mesh::node::Node;
    use crate::fem_problem::linalg::{dense_solve::DenseSolver, iterative::IterativeSolver};
    use std::sync::Arc;

    /// Unit spring between the two Nodes of every Element
    struct UnitSpring;

    impl ElementFormulation<f64> for UnitSpring {
        fn element_constitutive(&self, _element: &Element) -> Result<DMatrix<f64>> {
            Ok(DMatrix::identity(1, 1))
        }

        fn element_stiffness(&self, element: &Element, _: &Quadrature) -> Result<DMatrix<f64>> {
            let k = self.element_constitutive(element)?[(0, 0)];
            Ok(DMatrix::from_row_slice(2, 2, &[k, -k, -k, k]))
        }

        fn element_rhs(&self, _element: &Element, _: &Quadrature) -> Result<DVector<f64>> {
            Ok(DVector::zeros(2))
        }
    }

    fn bar(num_elements: usize) -> Mesh {
        let mut mesh = Mesh::new();
        for id in 0..=num_elements {
            mesh.add_node(Node::new(id, &[id as f64, 0.0], 1).unwrap()).unwrap();
        }
        for id in 0..num_elements {
            mesh.add_element(Element::new(id, &[id, id + 1], Arc::new(Line2)).unwrap())
                .unwrap();
        }
        mesh
    }

    #[test]
    fn two_node_bar() {
        let mut mesh = bar(1);
        mesh.boundary_condition_mut().set_dirichlet(0, 0, 0.0);

        let mut model = LinearModel::new(
            mesh,
            UnitSpring,
            IterativeSolver::default(),
            FemConfig::default(),
        );
        model.add_nodal_load(1, 0, 10.0);
        model.run().unwrap();

        assert!(model.mesh().node(0).unwrap().value(0).unwrap().abs() < 1e-12);
        assert!((model.mesh().node(1).unwrap().value(0).unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn phases_in_order() {
        let mut mesh = bar(4);
        mesh.generate_global_dofs();
        mesh.boundary_condition_mut().set_dirichlet(0, 0, 1.0);
        mesh.boundary_condition_mut().set_dirichlet(4, 0, 3.0);

        let config = FemConfig::default().with_parallel_assembly(false);
        let mut model = LinearModel::new(mesh, UnitSpring, DenseSolver, config);

        model.assemble_global_system().unwrap();
        let (matrix, rhs) = model.system().unwrap();
        assert_eq!(matrix.nrows(), 5);
        assert_eq!(rhs.len(), 5);

        model.apply_boundary_condition().unwrap();
        model.solve().unwrap();
        model.assign_solution_to_nodes().unwrap();

        for (i, node) in model.mesh().nodes().iter().enumerate() {
            let expected = 1.0 + 0.5 * i as f64;
            assert!((node.value(0).unwrap() - expected).abs() < 1e-12);
        }
        assert_eq!(model.solution().unwrap().len(), 5);
    }

    #[test]
    fn out_of_order_phases_are_rejected() {
        let mut mesh = bar(2);
        mesh.boundary_condition_mut().set_dirichlet(0, 0, 0.0);
        let mut model = LinearModel::new(
            mesh,
            UnitSpring,
            IterativeSolver::default(),
            FemConfig::default(),
        );

        assert!(matches!(
            model.assemble_global_system(),
            Err(FemError::DofsNotNumbered)
        ));
        model.mesh_mut().generate_global_dofs();

        assert!(matches!(model.solve(), Err(FemError::WorkflowOrder(_))));
        assert!(matches!(
            model.apply_boundary_condition(),
            Err(FemError::WorkflowOrder(_))
        ));

        model.assemble_global_system().unwrap();
        assert!(matches!(model.solve(), Err(FemError::WorkflowOrder(_))));
        assert!(matches!(
            model.assign_solution_to_nodes(),
            Err(FemError::WorkflowOrder(_))
        ));

        model.apply_boundary_condition().unwrap();
        assert!(matches!(
            model.apply_boundary_condition(),
            Err(FemError::WorkflowOrder(_))
        ));
        model.solve().unwrap();

        // touching the mesh discards the stale solution
        model.mesh_mut();
        assert!(model.solution().is_none());
        assert!(matches!(
            model.assign_solution_to_nodes(),
            Err(FemError::WorkflowOrder(_))
        ));
    }

    #[test]
    fn unconstrained_system_is_singular() {
        let mut model = LinearModel::new(bar(1), UnitSpring, DenseSolver, FemConfig::default());
        model.add_nodal_load(1, 0, 1.0);
        assert!(matches!(model.run(), Err(FemError::SingularSystem(_))));
    }

    #[test]
    fn parallel_and_sequential_assembly_agree() {
        let assemble = |parallel: bool| {
            let mut mesh = bar(40);
            mesh.generate_global_dofs();
            let config = FemConfig::default().with_parallel_assembly(parallel);
            let mut model = LinearModel::new(mesh, UnitSpring, DenseSolver, config);
            model.assemble_global_system().unwrap();
            let (matrix, _) = model.system().unwrap();
            DMatrix::from(matrix)
        };
        assert_eq!(assemble(true), assemble(false));
    }

    #[test]
    fn logs_to_injected_subscriber() {
        use std::io::Write;
        use std::sync::Mutex;

        #[derive(Clone, Default)]
        struct Captured(Arc<Mutex<Vec<u8>>>);

        impl Write for Captured {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut mesh = bar(1);
            mesh.boundary_condition_mut().set_dirichlet(0, 0, 0.0);
            let mut model = LinearModel::new(
                mesh,
                UnitSpring,
                IterativeSolver::default(),
                FemConfig::default(),
            );
            model.add_nodal_load(1, 0, 10.0);
            model.run().unwrap();
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("assembled global system"));
        assert!(output.contains("applied boundary conditions"));
        assert!(output.contains("solved global system"));
        assert!(output.contains("jacobi-pcg"));
    }
}
