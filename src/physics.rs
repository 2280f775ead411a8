//! The callbacks through which user physics contributes to assembly.
use crate::allocators::DimAllocator;
use crate::assembly::local::LocalSystem;
use crate::context::ElementContext;
use crate::{Real, SmallDim};
use nalgebra::DefaultAllocator;

/// Element and side contributions of a system of PDEs.
///
/// Every callback receives a `request_jacobian` flag and returns whether it actually added its
/// contribution to the local Jacobian. When a requested Jacobian is not produced, assembly
/// approximates the Jacobian of the whole phase with finite differences of the residual. A
/// callback is only asked for a Jacobian if all earlier callbacks of the same phase produced
/// one.
///
/// Callbacks add their contributions to the local residual and Jacobian. The context is
/// read-only; all finite element values it exposes have been initialized before the call.
///
/// The default implementations contribute nothing and report the Jacobian as computed, except
/// for [`mass_residual`](Self::mass_residual), which defaults to [`default_mass_residual`].
///
/// An error returned from a callback aborts the whole assembly.
#[allow(unused_variables)]
pub trait FemPhysics<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Adds the interior contribution of the steady residual `F(u)` in `du/dt = F(u)`.
    fn element_time_derivative(
        &self,
        request_jacobian: bool,
        context: &ElementContext<T, D>,
        local: &mut LocalSystem<T>,
    ) -> eyre::Result<bool> {
        Ok(request_jacobian)
    }

    /// Adds the interior contribution of the constraint `G(u)` in `0 = G(u)`.
    fn element_constraint(
        &self,
        request_jacobian: bool,
        context: &ElementContext<T, D>,
        local: &mut LocalSystem<T>,
    ) -> eyre::Result<bool> {
        Ok(request_jacobian)
    }

    /// Adds the contribution of the current side to the steady residual.
    fn side_time_derivative(
        &self,
        request_jacobian: bool,
        context: &ElementContext<T, D>,
        local: &mut LocalSystem<T>,
    ) -> eyre::Result<bool> {
        Ok(request_jacobian)
    }

    /// Adds the contribution of the current side to the constraint.
    fn side_constraint(
        &self,
        request_jacobian: bool,
        context: &ElementContext<T, D>,
        local: &mut LocalSystem<T>,
    ) -> eyre::Result<bool> {
        Ok(request_jacobian)
    }

    /// Adds the mass contribution `M du/dt` of the time-evolving variables, evaluated with the
    /// current solution standing in for `du/dt`.
    ///
    /// Only called during transient solves. Custom mass matrices, for example lumped ones,
    /// override this.
    fn mass_residual(
        &self,
        request_jacobian: bool,
        context: &ElementContext<T, D>,
        local: &mut LocalSystem<T>,
    ) -> eyre::Result<bool> {
        default_mass_residual(request_jacobian, context, local)
    }
}

/// The consistent mass residual of all time-evolving variables.
///
/// For every time-evolving variable `u`, adds the residual $(u, \phi_i)$ and, if requested,
/// the Jacobian $(\phi_j, \phi_i)$ integrated with the interior quadrature rule. Variables that
/// are not time-evolving receive no contribution.
pub fn default_mass_residual<T, D>(
    request_jacobian: bool,
    context: &ElementContext<T, D>,
    local: &mut LocalSystem<T>,
) -> eyre::Result<bool>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    for variable in 0..context.num_variables() {
        if !context.is_time_evolving(variable) {
            continue;
        }
        let n = context.num_variable_dofs(variable);
        for (qp, &jxw) in context.interior_jxw().iter().enumerate() {
            let u = context.interior_value(variable, qp);
            let mut residual = local.residual_block_mut(variable);
            for i in 0..n {
                residual[i] += jxw * u * context.interior_phi(variable, i, qp);
            }

            if request_jacobian {
                let mut jacobian = local.jacobian_block_mut(variable, variable);
                for i in 0..n {
                    let phi_i = context.interior_phi(variable, i, qp);
                    for j in 0..n {
                        jacobian[(i, j)] += jxw * phi_i * context.interior_phi(variable, j, qp);
                    }
                }
            }
        }
    }
    Ok(request_jacobian)
}
