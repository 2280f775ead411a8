//! Systems of finite element variables and their assembly.
use crate::allocators::DimAllocator;
use crate::assembly::global::{GlobalMatrix, GlobalSystem, GlobalVector};
use crate::assembly::local::{assemble_element, ElementContribution, ElementRequest};
use crate::assembly::numeric::FiniteDifferenceScheme;
use crate::context::{ElementContext, SolutionState};
use crate::dof_map::{DofMap, LagrangeDofMap};
use crate::element::FeType;
use crate::error::ConfigurationError;
use crate::mesh::FemMesh;
use crate::physics::FemPhysics;
use crate::postprocess::{run_postprocess, Postprocessor};
use crate::quadrature::{check_quadrature_available, max_effective_order, select_quadrature_strength};
use crate::{Real, SmallDim};
use nalgebra::{convert, DefaultAllocator};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::marker::PhantomData;

/// Settings that control assembly and postprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(serialize = "T: Serialize", deserialize = "T: Real + Deserialize<'de>"))]
pub struct FemSystemSettings<T> {
    /// The perturbation of each local coefficient when approximating Jacobians with finite
    /// differences.
    pub numerical_jacobian_h: T,
    /// If positive, every analytic Jacobian is compared against a finite difference
    /// approximation, and a relative discrepancy (in the matrix 1-norm) above this tolerance
    /// fails the assembly. Zero disables verification.
    pub verify_analytic_jacobians: T,
    /// Added to the quadrature strength `2p + 1`, where `p` is the highest polynomial order
    /// among the variables on an element. May be negative.
    pub extra_quadrature_order: i32,
    /// Whether finite element values are initialized with the default quadrature rules before
    /// postprocessing callbacks. If not, postprocessors must initialize them themselves.
    pub fe_reinit_during_postprocess: bool,
    /// Whether hessians of basis functions are computed.
    pub second_derivatives: bool,
    /// Whether side callbacks are also invoked on sides shared by two elements. Otherwise only
    /// sides on the domain boundary are visited.
    pub compute_internal_sides: bool,
    /// Selects the forward or central difference quotient for numeric Jacobians.
    pub finite_difference: FiniteDifferenceScheme,
    /// Whether elements are processed in parallel.
    pub parallel_assembly: bool,
}

impl<T: Real> Default for FemSystemSettings<T> {
    fn default() -> Self {
        Self {
            numerical_jacobian_h: convert(1e-6),
            verify_analytic_jacobians: T::zero(),
            extra_quadrature_order: 0,
            fe_reinit_during_postprocess: true,
            second_derivatives: true,
            compute_internal_sides: false,
            finite_difference: FiniteDifferenceScheme::Forward,
            parallel_assembly: false,
        }
    }
}

impl<T: Real> FemSystemSettings<T> {
    /// Checks that the numeric settings can be used for assembly.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let h = self.numerical_jacobian_h;
        if !(h.is_finite() && h > T::zero()) {
            return Err(ConfigurationError::InvalidSetting {
                name: "numerical_jacobian_h",
                requirement: "finite and positive",
            });
        }
        // NaN compares false
        if !(self.verify_analytic_jacobians >= T::zero()) {
            return Err(ConfigurationError::InvalidSetting {
                name: "verify_analytic_jacobians",
                requirement: "non-negative",
            });
        }
        Ok(())
    }
}

/// A field variable of a system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    fe_type: FeType,
    time_evolving: bool,
}

impl Variable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fe_type(&self) -> FeType {
        self.fe_type
    }

    /// Whether the variable satisfies `du/dt = F(u)` rather than `0 = G(u)`.
    pub fn is_time_evolving(&self) -> bool {
        self.time_evolving
    }
}

/// A nonlinear, implicit and possibly time-dependent system of finite element variables.
///
/// Variables are registered with [`add_variable`](Self::add_variable) and
/// [`time_evolving`](Self::time_evolving) until the system is initialized for a mesh with
/// [`init`](Self::init). Afterwards, [`assembly`](Self::assembly) computes global residuals and
/// Jacobians from the physics callbacks.
#[derive(Debug, Clone)]
pub struct FemSystem<T, D, P> {
    physics: P,
    settings: FemSystemSettings<T>,
    variables: Vec<Variable>,
    initialized: bool,
    transient: bool,
    marker: PhantomData<D>,
}

impl<T, D, P> FemSystem<T, D, P>
where
    T: Real,
    D: SmallDim,
    P: FemPhysics<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn new(physics: P) -> Self {
        Self::with_settings(physics, FemSystemSettings::default())
    }

    pub fn with_settings(physics: P, settings: FemSystemSettings<T>) -> Self {
        Self {
            physics,
            settings,
            variables: Vec::new(),
            initialized: false,
            transient: false,
            marker: PhantomData,
        }
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    pub fn settings(&self) -> &FemSystemSettings<T> {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut FemSystemSettings<T> {
        &mut self.settings
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// The index of the first variable with the given name.
    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables
            .iter()
            .position(|variable| variable.name == name)
    }

    pub fn fe_types(&self) -> Vec<FeType> {
        self.variables
            .iter()
            .map(|variable| variable.fe_type)
            .collect()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Registers a variable and returns its index.
    pub fn add_variable(&mut self, name: impl Into<String>, fe_type: FeType) -> Result<usize, ConfigurationError> {
        if self.initialized {
            return Err(ConfigurationError::SystemFinalized);
        }
        self.variables.push(Variable {
            name: name.into(),
            fe_type,
            time_evolving: false,
        });
        Ok(self.variables.len() - 1)
    }

    /// Marks a variable as evolving in time, so that it receives a mass residual during
    /// transient solves. Marking a variable more than once has no further effect.
    pub fn time_evolving(&mut self, variable: usize) -> Result<(), ConfigurationError> {
        if self.initialized {
            return Err(ConfigurationError::SystemFinalized);
        }
        let num_variables = self.variables.len();
        let variable = self
            .variables
            .get_mut(variable)
            .ok_or(ConfigurationError::UnknownVariable { variable, num_variables })?;
        variable.time_evolving = true;
        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the variable does not exist.
    pub fn is_time_evolving(&self, variable: usize) -> bool {
        self.variables[variable].time_evolving
    }

    /// Sets whether a time-dependent solve is in progress, which enables the mass phase of
    /// assembly.
    pub fn set_transient(&mut self, transient: bool) {
        self.transient = transient;
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    /// Whether assembly currently computes mass contributions.
    pub fn computes_mass(&self) -> bool {
        self.transient && self.variables.iter().any(|v| v.time_evolving)
    }

    /// Validates the variables against every element of the mesh and freezes registration.
    ///
    /// Every variable's element type must be supported on every shape and p-level of the mesh,
    /// and quadrature rules of the required strength must be available.
    pub fn init<M>(&mut self, mesh: &M) -> Result<(), ConfigurationError>
    where
        M: ?Sized + FemMesh<T, D>,
    {
        if self.variables.is_empty() {
            return Err(ConfigurationError::NoVariables);
        }
        self.settings.validate()?;

        let element_kinds: BTreeSet<_> = (0..mesh.num_elements())
            .map(|element| (mesh.element_shape(element), mesh.element_p_level(element)))
            .collect();
        let fe_types = self.fe_types();
        for &(shape, p_level) in &element_kinds {
            for fe_type in &fe_types {
                fe_type.check_supported(shape, p_level)?;
            }
            let strength = select_quadrature_strength(
                max_effective_order(&fe_types, p_level),
                self.settings.extra_quadrature_order,
            );
            check_quadrature_available(shape, strength)?;
        }

        self.initialized = true;
        log::info!(
            "Initialized system with {} variables ({} time-evolving) on {} elements",
            self.variables.len(),
            self.variables.iter().filter(|v| v.time_evolving).count(),
            mesh.num_elements()
        );
        Ok(())
    }

    /// Numbers the degrees of freedom of the system's variables on the mesh.
    pub fn build_dof_map<M>(&self, mesh: &M) -> Result<LagrangeDofMap, ConfigurationError>
    where
        M: ?Sized + FemMesh<T, D>,
    {
        LagrangeDofMap::build(mesh, &self.fe_types())
    }

    /// A fresh element context for the system's variables and settings.
    pub fn new_context(&self) -> ElementContext<T, D> {
        let time_evolving: Vec<_> = self.variables.iter().map(|v| v.time_evolving).collect();
        ElementContext::new(&self.fe_types(), &time_evolving, &self.settings)
    }

    fn check_initialized(&self) -> Result<(), ConfigurationError> {
        if self.initialized {
            Ok(())
        } else {
            Err(ConfigurationError::NotInitialized)
        }
    }

    fn check_dof_map<M, Map>(&self, mesh: &M, dof_map: &Map, state: &SolutionState<T>) -> Result<(), ConfigurationError>
    where
        M: ?Sized + FemMesh<T, D>,
        Map: ?Sized + DofMap,
    {
        check_size("variables", self.variables.len(), dof_map.num_variables())?;
        check_size("elements", mesh.num_elements(), dof_map.num_elements())?;
        check_size("solution entries", dof_map.num_dofs(), state.len())
    }

    /// Assembles the global residual and/or Jacobian of the system into `system`.
    ///
    /// Elements are visited in order (or in parallel, see
    /// [`FemSystemSettings::parallel_assembly`]), skipping elements that are not active and
    /// local. Per element, the interior phase, the side phases and, during transient solves,
    /// the mass phase are evaluated. The steady contributions are added to
    /// `system.residual` / `system.jacobian` and the mass contributions to
    /// `system.mass_residual` / `system.mass_jacobian`.
    ///
    /// The requested targets are zeroed before the contributions are added. If any element
    /// fails, the error is returned and the targets are left untouched.
    pub fn assembly<M, Map, V, Mat>(
        &self,
        mesh: &M,
        dof_map: &Map,
        state: &SolutionState<T>,
        get_residual: bool,
        get_jacobian: bool,
        system: &mut GlobalSystem<V, Mat>,
    ) -> eyre::Result<()>
    where
        P: Sync,
        M: ?Sized + Sync + FemMesh<T, D>,
        Map: ?Sized + Sync + DofMap,
        V: GlobalVector<T>,
        Mat: GlobalMatrix<T>,
    {
        self.check_initialized()?;
        self.settings.validate()?;
        self.check_dof_map(mesh, dof_map, state)?;
        let n = dof_map.num_dofs();
        let mass = self.computes_mass();
        if get_residual {
            check_size("residual entries", n, system.residual.len())?;
            if mass {
                check_size("mass residual entries", n, system.mass_residual.len())?;
            }
        }
        if get_jacobian {
            check_size("Jacobian rows", n, system.jacobian.nrows())?;
            check_size("Jacobian columns", n, system.jacobian.ncols())?;
            if mass {
                check_size("mass Jacobian rows", n, system.mass_jacobian.nrows())?;
                check_size("mass Jacobian columns", n, system.mass_jacobian.ncols())?;
            }
        }
        if !get_residual && !get_jacobian {
            return Ok(());
        }

        let elements: Vec<usize> = (0..mesh.num_elements())
            .filter(|&element| mesh.is_active_local(element))
            .collect();
        log::debug!(
            "Assembling {}{} on {} elements",
            if get_residual { "residual" } else { "" },
            if get_jacobian { " Jacobian" } else { "" },
            elements.len()
        );

        let request = ElementRequest {
            jacobian: get_jacobian,
            mass,
            settings: &self.settings,
        };
        let contributions: Vec<ElementContribution<T>> = if self.settings.parallel_assembly {
            elements
                .par_iter()
                .map_init(
                    || self.new_context(),
                    |context, &element| {
                        assemble_element(&self.physics, mesh, dof_map, state, element, request, context)
                    },
                )
                .collect::<eyre::Result<_>>()?
        } else {
            let mut context = self.new_context();
            elements
                .iter()
                .map(|&element| assemble_element(&self.physics, mesh, dof_map, state, element, request, &mut context))
                .collect::<eyre::Result<_>>()?
        };

        if get_jacobian {
            for contribution in &contributions {
                system.jacobian.validate_local(&contribution.dofs)?;
                if contribution.mass.is_some() {
                    system.mass_jacobian.validate_local(&contribution.dofs)?;
                }
            }
        }

        commit_contributions(&contributions, get_residual, get_jacobian, mass, system)?;

        let numeric_jacobians: usize = contributions
            .iter()
            .map(|c| c.steady.numeric_jacobians + c.mass.as_ref().map_or(0, |m| m.numeric_jacobians))
            .sum();
        if get_jacobian && self.settings.verify_analytic_jacobians > T::zero() && numeric_jacobians > 0 {
            log::warn!(
                "Jacobian verification is enabled, but {} element phases provided no analytic Jacobian to verify",
                numeric_jacobians
            );
        }
        log::debug!(
            "Finished assembly ({} element phases with finite difference Jacobians)",
            numeric_jacobians
        );
        Ok(())
    }

    /// Runs a postprocessing pass over all active and local elements, and over their sides if
    /// the postprocessor asks for it.
    ///
    /// No global quantities are computed or modified.
    pub fn postprocess<M, Map, Post>(
        &self,
        mesh: &M,
        dof_map: &Map,
        state: &SolutionState<T>,
        postprocessor: &mut Post,
    ) -> eyre::Result<()>
    where
        M: ?Sized + FemMesh<T, D>,
        Map: ?Sized + DofMap,
        Post: ?Sized + Postprocessor<T, D>,
    {
        self.check_initialized()?;
        self.check_dof_map(mesh, dof_map, state)?;
        let mut context = self.new_context();
        run_postprocess(mesh, dof_map, state, &self.settings, &mut context, postprocessor)
    }
}

fn check_size(quantity: &'static str, expected: usize, actual: usize) -> Result<(), ConfigurationError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ConfigurationError::DofMapMismatch {
            quantity,
            expected,
            actual,
        })
    }
}

fn commit_contributions<T, V, Mat>(
    contributions: &[ElementContribution<T>],
    get_residual: bool,
    get_jacobian: bool,
    mass: bool,
    system: &mut GlobalSystem<V, Mat>,
) -> eyre::Result<()>
where
    T: Real,
    V: GlobalVector<T>,
    Mat: GlobalMatrix<T>,
{
    // Mass targets are only touched when the mass phase runs
    if get_residual {
        system.residual.set_zero();
        if mass {
            system.mass_residual.set_zero();
        }
    }
    if get_jacobian {
        system.jacobian.set_zero();
        if mass {
            system.mass_jacobian.set_zero();
        }
    }

    for contribution in contributions {
        let dofs = &contribution.dofs;
        if get_residual {
            system.residual.add_local(dofs, &contribution.steady.residual);
        }
        if let Some(jacobian) = &contribution.steady.jacobian {
            system.jacobian.add_local(dofs, jacobian)?;
        }
        if let Some(mass) = &contribution.mass {
            if get_residual {
                system.mass_residual.add_local(dofs, &mass.residual);
            }
            if let Some(jacobian) = &mass.jacobian {
                system.mass_jacobian.add_local(dofs, jacobian)?;
            }
        }
    }
    Ok(())
}
