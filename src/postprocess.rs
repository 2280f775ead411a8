//! Postprocessing passes over the elements of a mesh.
use crate::allocators::DimAllocator;
use crate::context::{ElementContext, SolutionState};
use crate::dof_map::DofMap;
use crate::mesh::FemMesh;
use crate::system::FemSystemSettings;
use crate::{Real, SmallDim};
use nalgebra::DefaultAllocator;

/// Callbacks invoked by [`FemSystem::postprocess`](crate::system::FemSystem::postprocess), for
/// example to compute functionals of the solution.
///
/// Unlike physics callbacks, postprocessors receive the context mutably, so that they can
/// initialize finite element values themselves when automatic initialization is disabled by
/// [`FemSystemSettings::fe_reinit_during_postprocess`].
#[allow(unused_variables)]
pub trait Postprocessor<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn element_postprocess(&mut self, context: &mut ElementContext<T, D>) -> eyre::Result<()> {
        Ok(())
    }

    fn side_postprocess(&mut self, context: &mut ElementContext<T, D>) -> eyre::Result<()> {
        Ok(())
    }

    /// Whether [`side_postprocess`](Self::side_postprocess) should be called for the sides of
    /// each element.
    fn postprocess_sides(&self) -> bool {
        false
    }
}

/// Visits all active and local elements in order, and their sides if requested.
///
/// Sides shared with another element are only visited if
/// [`FemSystemSettings::compute_internal_sides`] is set.
pub fn run_postprocess<T, D, M, Map, Post>(
    mesh: &M,
    dof_map: &Map,
    state: &SolutionState<T>,
    settings: &FemSystemSettings<T>,
    context: &mut ElementContext<T, D>,
    postprocessor: &mut Post,
) -> eyre::Result<()>
where
    T: Real,
    D: SmallDim,
    M: ?Sized + FemMesh<T, D>,
    Map: ?Sized + DofMap,
    Post: ?Sized + Postprocessor<T, D>,
    DefaultAllocator: DimAllocator<T, D>,
{
    let reinit_fe = settings.fe_reinit_during_postprocess;
    for element in (0..mesh.num_elements()).filter(|&element| mesh.is_active_local(element)) {
        context.reinit_element(mesh, dof_map, element, state)?;
        if reinit_fe {
            context.reinit_interior_fe()?;
        }
        postprocessor.element_postprocess(context)?;

        if postprocessor.postprocess_sides() {
            for side in 0..context.element_shape().num_sides() {
                let neighbor = mesh.element_neighbor(element, side);
                if neighbor.is_some() && !settings.compute_internal_sides {
                    continue;
                }
                context.reinit_side(side, neighbor);
                if reinit_fe {
                    context.reinit_side_fe()?;
                }
                postprocessor.side_postprocess(context)?;
                context.clear_side();
            }
        }
    }
    context.clear();
    Ok(())
}
