use femsystem::assembly::global::{assemble_sparsity_pattern, GlobalMatrix, GlobalSystem, GlobalVector};
use femsystem::assembly::local::{assemble_element, evaluate_phase, ElementRequest, LocalSystem};
use femsystem::assembly::Phase;
use femsystem::context::{ElementContext, SolutionState};
use femsystem::dof_map::{DofMap, LagrangeDofMap};
use femsystem::element::FeType;
use femsystem::error::AssemblyError;
use femsystem::mesh::procedural::{create_unit_interval_uniform_mesh_1d, create_unit_square_uniform_quad_mesh_2d};
use femsystem::nalgebra::{dmatrix, dvector, DMatrix, DVector, U2};
use femsystem::nalgebra_sparse::CsrMatrix;
use femsystem::physics::FemPhysics;
use femsystem::system::FemSystemSettings;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use std::cell::RefCell;

#[test]
fn local_system_blocks() {
    let mut local = LocalSystem::<f64>::new(vec![0..2, 2..5]);
    assert_eq!(local.num_dofs(), 5);
    assert_eq!(local.num_variables(), 2);
    assert_eq!(local.variable_range(1), 2..5);

    local.residual_block_mut(1).fill(1.0);
    local.jacobian_block_mut(0, 1).fill(2.0);
    local.jacobian_block_mut(1, 1)[(2, 0)] = 3.0;
    assert_matrix_eq!(local.residual(), dvector![0.0, 0.0, 1.0, 1.0, 1.0]);
    let expected_jacobian = dmatrix![
        0.0, 0.0, 2.0, 2.0, 2.0;
        0.0, 0.0, 2.0, 2.0, 2.0;
        0.0, 0.0, 0.0, 0.0, 0.0;
        0.0, 0.0, 0.0, 0.0, 0.0;
        0.0, 0.0, 3.0, 0.0, 0.0
    ];
    assert_matrix_eq!(local.jacobian(), expected_jacobian);

    local.residual_mut()[0] = 5.0;
    local.jacobian_mut()[(0, 0)] = 5.0;
    local.set_zero();
    assert_matrix_eq!(local.residual(), DVector::zeros(5));
    assert_matrix_eq!(local.jacobian(), DMatrix::zeros(5, 5));

    let empty = LocalSystem::<f64>::new(Vec::new());
    assert_eq!(empty.num_dofs(), 0);
}

#[test]
fn dense_targets_accumulate_local_contributions() {
    let mut vector = DVector::<f64>::zeros(4);
    vector.add_local(&[3, 1], &dvector![1.0, 2.0]);
    vector.add_local(&[1], &dvector![0.5]);
    assert_matrix_eq!(vector, dvector![0.0, 2.5, 0.0, 1.0]);
    assert_eq!(GlobalVector::len(&vector), 4);
    GlobalVector::set_zero(&mut vector);
    assert_matrix_eq!(vector, DVector::zeros(4));

    let mut matrix = DMatrix::<f64>::zeros(3, 3);
    matrix
        .add_local(&[2, 0], &dmatrix![1.0, 2.0; 3.0, 4.0])
        .unwrap();
    let expected = dmatrix![4.0, 0.0, 3.0;
                            0.0, 0.0, 0.0;
                            2.0, 0.0, 1.0];
    assert_matrix_eq!(matrix, expected);
    assert!(matrix.validate_local(&[0, 1, 2]).is_ok());
}

#[test]
fn sparsity_pattern_couples_element_dofs() {
    // Three segments with four nodes give a tridiagonal pattern
    let mesh = create_unit_interval_uniform_mesh_1d::<f64>(3);
    let dof_map = LagrangeDofMap::build(&mesh, &[FeType::lagrange(1)]).unwrap();
    let pattern = assemble_sparsity_pattern(&dof_map);
    assert_eq!(pattern.major_dim(), 4);
    assert_eq!(pattern.nnz(), 10);
    assert_eq!(pattern.lane(0), &[0, 1]);
    assert_eq!(pattern.lane(1), &[0, 1, 2]);

    // Variables on the same element are coupled
    let two_variables = LagrangeDofMap::build(&mesh, &[FeType::lagrange(1), FeType::discontinuous_lagrange(0)]).unwrap();
    let pattern = assemble_sparsity_pattern(&two_variables);
    assert_eq!(pattern.major_dim(), 7);
    assert_eq!(pattern.nnz(), 10 + 3 * 4 + 3);
}

#[test]
fn csr_targets_accumulate_within_pattern() {
    let mesh = create_unit_interval_uniform_mesh_1d::<f64>(3);
    let dof_map = LagrangeDofMap::build(&mesh, &[FeType::lagrange(1)]).unwrap();
    let mut global = GlobalSystem::<DVector<f64>, CsrMatrix<f64>>::csr(assemble_sparsity_pattern(&dof_map));
    assert_eq!(GlobalMatrix::nrows(&global.jacobian), 4);
    assert_eq!(global.mass_jacobian.nnz(), 10);

    let local = dmatrix![1.0, -1.0; -1.0, 1.0];
    for element in 0..3 {
        let dofs = dof_map.element_dofs(element, 0);
        global.jacobian.validate_local(dofs).unwrap();
        global.jacobian.add_local(dofs, &local).unwrap();
    }
    // Unsorted indices are fine
    global.jacobian.add_local(&[1, 0], &dmatrix![0.0, 0.5; 0.0, 0.0]).unwrap();

    let expected = dmatrix![1.0, -1.0, 0.0, 0.0;
                            -0.5, 2.0, -1.0, 0.0;
                            0.0, -1.0, 2.0, -1.0;
                            0.0, 0.0, -1.0, 1.0];
    assert_matrix_eq!(DMatrix::from(&global.jacobian), expected);

    GlobalMatrix::set_zero(&mut global.jacobian);
    assert!(global.jacobian.values().iter().all(|&v| v == 0.0));
}

#[test]
fn csr_targets_reject_entries_outside_pattern() {
    let mesh = create_unit_interval_uniform_mesh_1d::<f64>(3);
    let dof_map = LagrangeDofMap::build(&mesh, &[FeType::lagrange(1)]).unwrap();
    let mut global = GlobalSystem::<DVector<f64>, CsrMatrix<f64>>::csr(assemble_sparsity_pattern(&dof_map));
    assert_eq!(
        global.jacobian.validate_local(&[0, 2]),
        Err(AssemblyError::MissingSparsityEntry { row: 0, col: 2 })
    );
    assert_eq!(
        global.jacobian.validate_local(&[7]),
        Err(AssemblyError::MissingSparsityEntry { row: 7, col: 7 })
    );
    let error = global
        .jacobian
        .add_local(&[3, 0], &DMatrix::from_element(2, 2, 1.0))
        .unwrap_err();
    assert_eq!(
        error.downcast_ref::<AssemblyError>(),
        Some(&AssemblyError::MissingSparsityEntry { row: 3, col: 0 })
    );
}

#[test]
fn dense_targets_are_zeroed() {
    let global = GlobalSystem::<DVector<f64>, DMatrix<f64>>::dense(3);
    assert_eq!(global.residual.len(), 3);
    assert_eq!(global.jacobian.shape(), (3, 3));
    assert_eq!(global.mass_residual, DVector::zeros(3));
    assert_eq!(global.mass_jacobian, DMatrix::zeros(3, 3));
}

#[test]
fn phase_display() {
    assert_eq!(Phase::Interior.to_string(), "interior");
    assert_eq!(Phase::Side(3).to_string(), "side 3");
    assert_eq!(Phase::Mass.to_string(), "mass");
}

/// Residual `u_i^2 + 3 u_i`, split over the two interior callbacks. The first callback declines
/// to compute its Jacobian if `first_declines` is set.
#[derive(Default)]
struct SplitPhysics {
    constraint_requests: RefCell<Vec<bool>>,
    visited_sides: RefCell<Vec<(usize, Option<usize>)>>,
    first_declines: bool,
}

impl FemPhysics<f64, U2> for SplitPhysics {
    fn element_time_derivative(
        &self,
        request_jacobian: bool,
        context: &ElementContext<f64, U2>,
        local: &mut LocalSystem<f64>,
    ) -> eyre::Result<bool> {
        let u = context.current_coefficients(0);
        for i in 0..u.len() {
            local.residual_mut()[i] += u[i] * u[i];
            if request_jacobian && !self.first_declines {
                local.jacobian_mut()[(i, i)] += 2.0 * u[i];
            }
        }
        Ok(request_jacobian && !self.first_declines)
    }

    fn element_constraint(
        &self,
        request_jacobian: bool,
        context: &ElementContext<f64, U2>,
        local: &mut LocalSystem<f64>,
    ) -> eyre::Result<bool> {
        self.constraint_requests.borrow_mut().push(request_jacobian);
        let u = context.current_coefficients(0);
        for i in 0..u.len() {
            local.residual_mut()[i] += 3.0 * u[i];
            if request_jacobian {
                local.jacobian_mut()[(i, i)] += 3.0;
            }
        }
        Ok(request_jacobian)
    }

    fn side_time_derivative(
        &self,
        request_jacobian: bool,
        context: &ElementContext<f64, U2>,
        _local: &mut LocalSystem<f64>,
    ) -> eyre::Result<bool> {
        self.visited_sides
            .borrow_mut()
            .push((context.side_index(), context.side_neighbor()));
        Ok(request_jacobian)
    }
}

fn expected_split_jacobian(u: &[f64]) -> DMatrix<f64> {
    DMatrix::from_diagonal(&DVector::from_iterator(u.len(), u.iter().map(|u_i| 2.0 * u_i + 3.0)))
}

#[test]
fn declined_jacobians_stop_the_chain_and_fall_back_to_finite_differences() {
    let mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(1);
    let fe_types = [FeType::lagrange(1)];
    let dof_map = LagrangeDofMap::build(&mesh, &fe_types).unwrap();
    let u = dvector![0.5, -1.0, 2.0, 0.25];
    let settings = FemSystemSettings {
        finite_difference: femsystem::assembly::numeric::FiniteDifferenceScheme::Central,
        ..Default::default()
    };
    let mut context = ElementContext::new(&fe_types, &[false], &settings);
    context
        .reinit_element(&mesh, &dof_map, 0, &SolutionState::steady(&u))
        .unwrap();
    context.reinit_interior_fe().unwrap();

    let physics = SplitPhysics {
        first_declines: true,
        ..Default::default()
    };
    let contribution = evaluate_phase(&physics, Phase::Interior, true, &mut context, &settings).unwrap();
    // The constraint is asked for a Jacobian only as long as the earlier callback produced one.
    // The fallback then evaluates both callbacks without requesting Jacobians
    let requests = physics.constraint_requests.borrow().clone();
    assert!(requests.iter().all(|&request| !request));
    assert_eq!(requests.len(), 1 + 2 * 4);
    assert_eq!(contribution.numeric_jacobians, 1);

    let local_u: Vec<f64> = context.current_coefficients(0).iter().copied().collect();
    let expected_residual = DVector::from_iterator(4, local_u.iter().map(|u_i| u_i * u_i + 3.0 * u_i));
    assert_matrix_eq!(contribution.residual, expected_residual, comp = abs, tol = 1e-14);
    assert_matrix_eq!(
        contribution.jacobian.unwrap(),
        expected_split_jacobian(&local_u),
        comp = abs,
        tol = 1e-8
    );
    // The local coefficients are restored after differencing
    assert_eq!(local_u, context.current_coefficients(0).iter().copied().collect::<Vec<_>>());
}

#[test]
fn complete_analytic_jacobians_are_used_directly() {
    let mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(1);
    let fe_types = [FeType::lagrange(1)];
    let dof_map = LagrangeDofMap::build(&mesh, &fe_types).unwrap();
    let u = dvector![0.5, -1.0, 2.0, 0.25];
    let settings = FemSystemSettings::default();
    let mut context = ElementContext::new(&fe_types, &[false], &settings);
    context
        .reinit_element(&mesh, &dof_map, 0, &SolutionState::steady(&u))
        .unwrap();
    context.reinit_interior_fe().unwrap();

    let physics = SplitPhysics::default();
    let contribution = evaluate_phase(&physics, Phase::Interior, true, &mut context, &settings).unwrap();
    assert_eq!(*physics.constraint_requests.borrow(), vec![true]);
    assert_eq!(contribution.numeric_jacobians, 0);
    let local_u: Vec<f64> = context.current_coefficients(0).iter().copied().collect();
    assert_matrix_eq!(contribution.jacobian.unwrap(), expected_split_jacobian(&local_u));

    let residual_only = evaluate_phase(&physics, Phase::Interior, false, &mut context, &settings).unwrap();
    assert!(residual_only.jacobian.is_none());
    assert_matrix_eq!(residual_only.residual, contribution.residual);
}

#[test]
fn element_assembly_visits_boundary_sides() {
    let mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(2);
    let fe_types = [FeType::lagrange(1)];
    let dof_map = LagrangeDofMap::build(&mesh, &fe_types).unwrap();
    let u = DVector::from_element(dof_map.num_dofs(), 1.0);
    let state = SolutionState::steady(&u);
    let mut settings = FemSystemSettings::default();
    let mut context = ElementContext::new(&fe_types, &[false], &settings);
    let physics = SplitPhysics::default();

    let request = ElementRequest {
        jacobian: true,
        mass: false,
        settings: &settings,
    };
    let contribution = assemble_element(&physics, &mesh, &dof_map, &state, 0, request, &mut context).unwrap();
    assert_eq!(contribution.element, 0);
    assert_eq!(contribution.dofs, dof_map.element_dofs(0, 0));
    assert!(contribution.mass.is_none());
    // Element 0 is the lower left cell
    assert_eq!(*physics.visited_sides.borrow(), vec![(0, None), (3, None)]);
    // Residual 1 + 3 = 4 per dof, Jacobian 2 + 3 = 5 on the diagonal
    assert_matrix_eq!(contribution.steady.residual, DVector::from_element(4, 4.0));
    assert_matrix_eq!(
        contribution.steady.jacobian.unwrap(),
        DMatrix::from_diagonal_element(4, 4, 5.0)
    );
    assert!(!context.has_side());

    physics.visited_sides.borrow_mut().clear();
    settings.compute_internal_sides = true;
    let request = ElementRequest {
        jacobian: false,
        mass: false,
        settings: &settings,
    };
    let contribution = assemble_element(&physics, &mesh, &dof_map, &state, 0, request, &mut context).unwrap();
    assert!(contribution.steady.jacobian.is_none());
    assert_eq!(
        *physics.visited_sides.borrow(),
        vec![(0, None), (1, Some(1)), (2, Some(2)), (3, None)]
    );
}

#[test]
fn mass_phase_uses_default_mass_residual() {
    let mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(1);
    let fe_types = [FeType::lagrange(1)];
    let dof_map = LagrangeDofMap::build(&mesh, &fe_types).unwrap();
    let u = DVector::from_element(4, 2.0);
    let state = SolutionState::steady(&u);
    let settings = FemSystemSettings::default();
    let mut context = ElementContext::new(&fe_types, &[true], &settings);
    let request = ElementRequest {
        jacobian: true,
        mass: true,
        settings: &settings,
    };
    let physics = SplitPhysics::default();
    let contribution = assemble_element(&physics, &mesh, &dof_map, &state, 0, request, &mut context).unwrap();
    let mass = contribution.mass.unwrap();
    let mass_matrix = mass.jacobian.unwrap();
    // The consistent mass matrix of the unit square sums to its area
    assert_scalar_eq!(mass_matrix.sum(), 1.0, comp = abs, tol = 1e-14);
    assert_scalar_eq!(mass_matrix[(0, 0)], 1.0 / 9.0, comp = abs, tol = 1e-14);
    assert_matrix_eq!(mass.residual, &mass_matrix * &u, comp = abs, tol = 1e-14);
    assert_eq!(mass.numeric_jacobians, 0);
}
