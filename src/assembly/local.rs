//! Local element systems and the evaluation of physics callbacks on a single element.
use crate::allocators::DimAllocator;
use crate::assembly::numeric::{finite_difference_jacobian, relative_discrepancy};
use crate::assembly::Phase;
use crate::context::{ElementContext, SolutionState};
use crate::dof_map::DofMap;
use crate::error::AssemblyError;
use crate::mesh::FemMesh;
use crate::physics::FemPhysics;
use crate::system::FemSystemSettings;
use crate::{Real, SmallDim};
use eyre::WrapErr;
use nalgebra::{
    try_convert, DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut, DefaultAllocator, Scalar,
};
use std::ops::Range;

/// The local residual and Jacobian of an element, with rows and columns grouped by variable.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSystem<T: Scalar> {
    residual: DVector<T>,
    jacobian: DMatrix<T>,
    variable_ranges: Vec<Range<usize>>,
}

impl<T: Real> LocalSystem<T> {
    /// A zeroed system whose variables occupy the given consecutive index ranges.
    pub fn new(variable_ranges: Vec<Range<usize>>) -> Self {
        let n = variable_ranges.last().map(|range| range.end).unwrap_or(0);
        Self {
            residual: DVector::zeros(n),
            jacobian: DMatrix::zeros(n, n),
            variable_ranges,
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.residual.len()
    }

    pub fn num_variables(&self) -> usize {
        self.variable_ranges.len()
    }

    pub fn variable_range(&self, variable: usize) -> Range<usize> {
        self.variable_ranges[variable].clone()
    }

    pub fn residual(&self) -> &DVector<T> {
        &self.residual
    }

    pub fn residual_mut(&mut self) -> &mut DVector<T> {
        &mut self.residual
    }

    pub fn jacobian(&self) -> &DMatrix<T> {
        &self.jacobian
    }

    pub fn jacobian_mut(&mut self) -> &mut DMatrix<T> {
        &mut self.jacobian
    }

    /// The rows of the residual belonging to the variable.
    pub fn residual_block_mut(&mut self, variable: usize) -> DVectorViewMut<T> {
        let range = self.variable_range(variable);
        self.residual.rows_mut(range.start, range.len())
    }

    /// The block of the Jacobian coupling the equations of variable `row_variable` to the
    /// degrees of freedom of `col_variable`.
    pub fn jacobian_block_mut(&mut self, row_variable: usize, col_variable: usize) -> DMatrixViewMut<T> {
        let rows = self.variable_range(row_variable);
        let cols = self.variable_range(col_variable);
        self.jacobian
            .view_mut((rows.start, cols.start), (rows.len(), cols.len()))
    }

    pub fn set_zero(&mut self) {
        self.residual.fill(T::zero());
        self.jacobian.fill(T::zero());
    }

    fn into_parts(self) -> (DVector<T>, DMatrix<T>) {
        (self.residual, self.jacobian)
    }
}

/// The residual and, if requested, the Jacobian produced by one or more phases.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseContribution<T: Scalar> {
    pub residual: DVector<T>,
    pub jacobian: Option<DMatrix<T>>,
    /// The number of phases whose Jacobian was approximated by finite differences.
    pub numeric_jacobians: usize,
}

impl<T: Real> PhaseContribution<T> {
    fn accumulate(&mut self, other: PhaseContribution<T>) {
        self.residual += other.residual;
        if let (Some(jacobian), Some(other)) = (&mut self.jacobian, other.jacobian) {
            *jacobian += other;
        }
        self.numeric_jacobians += other.numeric_jacobians;
    }
}

/// Everything an element adds to the global system.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementContribution<T: Scalar> {
    pub element: usize,
    /// Global indices of the rows and columns of the local contributions.
    pub dofs: Vec<usize>,
    /// Interior and side phases.
    pub steady: PhaseContribution<T>,
    /// The mass phase, present only during transient solves with time-evolving variables.
    pub mass: Option<PhaseContribution<T>>,
}

/// Runs the callbacks of a phase, asking for a Jacobian only as long as every earlier callback
/// produced one. Returns whether the phase produced a complete Jacobian.
fn run_phase_callbacks<T, D, P>(
    physics: &P,
    phase: Phase,
    request_jacobian: bool,
    context: &ElementContext<T, D>,
    local: &mut LocalSystem<T>,
) -> eyre::Result<bool>
where
    T: Real,
    D: SmallDim,
    P: ?Sized + FemPhysics<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    let mut jacobian_computed = request_jacobian;
    let result = match phase {
        Phase::Interior => physics
            .element_time_derivative(jacobian_computed, context, local)
            .and_then(|computed| {
                jacobian_computed &= computed;
                physics.element_constraint(jacobian_computed, context, local)
            }),
        Phase::Side(_) => physics
            .side_time_derivative(jacobian_computed, context, local)
            .and_then(|computed| {
                jacobian_computed &= computed;
                physics.side_constraint(jacobian_computed, context, local)
            }),
        Phase::Mass => physics.mass_residual(jacobian_computed, context, local),
    };
    let computed = result.wrap_err_with(|| {
        format!(
            "Physics failed on element {} during the {} phase",
            context.element_index(),
            phase
        )
    })?;
    Ok(jacobian_computed && computed)
}

/// Approximates the Jacobian of a phase by perturbing the local coefficients of the current
/// solution and re-running its callbacks without requesting Jacobians.
fn numeric_phase_jacobian<T, D, P>(
    physics: &P,
    phase: Phase,
    context: &mut ElementContext<T, D>,
    settings: &FemSystemSettings<T>,
) -> eyre::Result<DMatrix<T>>
where
    T: Real,
    D: SmallDim,
    P: ?Sized + FemPhysics<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    let unperturbed = context.local_current().clone();
    let mut coefficients = unperturbed.clone();
    let m = context.num_local_dofs();
    let result = finite_difference_jacobian(
        m,
        |u, mut residual| {
            context.set_local_current(u);
            let mut local = context.new_local_system();
            run_phase_callbacks(physics, phase, false, context, &mut local)?;
            residual.copy_from(local.residual());
            Ok(())
        },
        &mut coefficients,
        settings.numerical_jacobian_h,
        settings.finite_difference,
    );
    context.set_local_current(DVectorView::from(&unperturbed));
    result
}

/// Evaluates a phase on the current element of the context.
///
/// If a Jacobian is requested but the callbacks do not produce one, it is approximated with
/// finite differences. If the callbacks do produce one and verification is enabled, it is
/// compared against the finite difference approximation and a mismatch is an error.
pub fn evaluate_phase<T, D, P>(
    physics: &P,
    phase: Phase,
    request_jacobian: bool,
    context: &mut ElementContext<T, D>,
    settings: &FemSystemSettings<T>,
) -> eyre::Result<PhaseContribution<T>>
where
    T: Real,
    D: SmallDim,
    P: ?Sized + FemPhysics<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    let mut local = context.new_local_system();
    let analytic = run_phase_callbacks(physics, phase, request_jacobian, context, &mut local)?;
    let (residual, analytic_jacobian) = local.into_parts();

    if !request_jacobian {
        return Ok(PhaseContribution {
            residual,
            jacobian: None,
            numeric_jacobians: 0,
        });
    }

    let tolerance = settings.verify_analytic_jacobians;
    let verify = tolerance > T::zero();
    if analytic && !verify {
        return Ok(PhaseContribution {
            residual,
            jacobian: Some(analytic_jacobian),
            numeric_jacobians: 0,
        });
    }

    let numeric_jacobian = numeric_phase_jacobian(physics, phase, context, settings)?;
    if !analytic {
        log::debug!(
            "No analytic Jacobian for element {} ({} phase), using finite differences",
            context.element_index(),
            phase
        );
        return Ok(PhaseContribution {
            residual,
            jacobian: Some(numeric_jacobian),
            numeric_jacobians: 1,
        });
    }

    let relative_error = relative_discrepancy(&numeric_jacobian, &analytic_jacobian);
    log::trace!(
        "Element {} ({} phase): relative Jacobian discrepancy {}",
        context.element_index(),
        phase,
        relative_error
    );
    if !relative_error.is_finite() || relative_error > tolerance {
        return Err(AssemblyError::JacobianMismatch {
            element: context.element_index(),
            phase,
            relative_error: try_convert(relative_error).unwrap_or(f64::NAN),
            tolerance: try_convert(tolerance).unwrap_or(f64::NAN),
        }
        .into());
    }

    Ok(PhaseContribution {
        residual,
        jacobian: Some(analytic_jacobian),
        numeric_jacobians: 0,
    })
}

/// What [`assemble_element`] should compute, and how.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ElementRequest<'a, T: Scalar> {
    pub jacobian: bool,
    pub mass: bool,
    pub settings: &'a FemSystemSettings<T>,
}

/// Computes the complete contribution of an element: the interior phase, the side phases of
/// boundary sides (and of interior sides if enabled in the settings) and the mass phase if
/// requested.
pub fn assemble_element<T, D, P, M, Map>(
    physics: &P,
    mesh: &M,
    dof_map: &Map,
    state: &SolutionState<T>,
    element: usize,
    request: ElementRequest<T>,
    context: &mut ElementContext<T, D>,
) -> eyre::Result<ElementContribution<T>>
where
    T: Real,
    D: SmallDim,
    P: ?Sized + FemPhysics<T, D>,
    M: ?Sized + FemMesh<T, D>,
    Map: ?Sized + DofMap,
    DefaultAllocator: DimAllocator<T, D>,
{
    let settings = request.settings;
    context.reinit_element(mesh, dof_map, element, state)?;
    context.reinit_interior_fe()?;
    let mut steady = evaluate_phase(physics, Phase::Interior, request.jacobian, context, settings)?;

    for side in 0..context.element_shape().num_sides() {
        let neighbor = mesh.element_neighbor(element, side);
        if neighbor.is_some() && !settings.compute_internal_sides {
            continue;
        }
        context.reinit_side(side, neighbor);
        context.reinit_side_fe()?;
        let contribution = evaluate_phase(physics, Phase::Side(side), request.jacobian, context, settings)?;
        steady.accumulate(contribution);
        context.clear_side();
    }

    let mass = if request.mass {
        Some(evaluate_phase(physics, Phase::Mass, request.jacobian, context, settings)?)
    } else {
        None
    };

    Ok(ElementContribution {
        element,
        dofs: context.dof_indices().to_vec(),
        steady,
        mass,
    })
}
