//! Degree-of-freedom maps from element-local basis functions to global indices.
use crate::allocators::DimAllocator;
use crate::element::FeType;
use crate::error::ConfigurationError;
use crate::mesh::{element_geometry, FemMesh};
use crate::{Real, SmallDim};
use nalgebra::{convert, DVectorViewMut, DefaultAllocator, OPoint, OVector};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Maps the local basis functions of each variable on each element to global indices.
pub trait DofMap {
    fn num_dofs(&self) -> usize;

    fn num_variables(&self) -> usize;

    fn num_elements(&self) -> usize;

    /// Global indices of the element's degrees of freedom for the variable, in the order of the
    /// nodes of the variable's reference basis.
    fn element_dofs(&self, element: usize, variable: usize) -> &[usize];
}

/// A degree-of-freedom map for continuous and discontinuous Lagrange variables.
///
/// Degrees of freedom are numbered variable by variable, so that the indices of each variable
/// form a contiguous block. Nodes of continuous variables are identified by the sorted global
/// vertex indices of the mesh entity supporting them, which makes them shared between all
/// elements touching that entity. Discontinuous variables get element-local degrees of freedom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagrangeDofMap {
    fe_types: Vec<FeType>,
    variable_offsets: Vec<usize>,
    // Start of the dofs of (element, variable) in `dofs`, indexed by element * nvars + variable
    offsets: Vec<usize>,
    dofs: Vec<usize>,
}

impl LagrangeDofMap {
    /// Numbers the degrees of freedom of the given variables on the mesh.
    ///
    /// Fails if an element type is not supported on the shape or p-level of some element.
    pub fn build<T, D>(mesh: &(impl FemMesh<T, D> + ?Sized), fe_types: &[FeType]) -> Result<Self, ConfigurationError>
    where
        T: Real,
        D: SmallDim,
        DefaultAllocator: DimAllocator<T, D>,
    {
        let num_elements = mesh.num_elements();
        let num_variables = fe_types.len();
        let mut element_dofs = vec![Vec::new(); num_elements * num_variables];
        let mut variable_offsets = vec![0];
        let mut next_dof = 0;

        for (variable, fe_type) in fe_types.iter().enumerate() {
            let mut continuous_nodes = FxHashMap::default();
            for element in 0..num_elements {
                let basis = fe_type.reference_basis(mesh.element_shape(element), mesh.element_p_level(element))?;
                let vertices = mesh.element_vertex_indices(element);
                let dofs = &mut element_dofs[element * num_variables + variable];
                for node in 0..basis.num_nodes() {
                    let dof = if fe_type.is_continuous() {
                        let mut key: Vec<usize> = basis
                            .node_support(node)
                            .iter()
                            .map(|&v| vertices[v])
                            .collect();
                        key.sort_unstable();
                        *continuous_nodes.entry(key).or_insert_with(|| {
                            next_dof += 1;
                            next_dof - 1
                        })
                    } else {
                        next_dof += 1;
                        next_dof - 1
                    };
                    dofs.push(dof);
                }
            }
            variable_offsets.push(next_dof);
        }

        let mut offsets = Vec::with_capacity(element_dofs.len() + 1);
        let mut dofs = Vec::new();
        offsets.push(0);
        for local_dofs in element_dofs {
            dofs.extend(local_dofs);
            offsets.push(dofs.len());
        }

        Ok(Self {
            fe_types: fe_types.to_vec(),
            variable_offsets,
            offsets,
            dofs,
        })
    }

    pub fn fe_types(&self) -> &[FeType] {
        &self.fe_types
    }

    /// The contiguous block of global indices belonging to the variable.
    pub fn variable_dofs(&self, variable: usize) -> Range<usize> {
        self.variable_offsets[variable]..self.variable_offsets[variable + 1]
    }

    /// Sets the degrees of freedom of a variable to the values of `f` at the nodes.
    ///
    /// Since the bases are nodal, this is the finite element interpolant of `f`.
    ///
    /// # Panics
    ///
    /// Panics if `u` does not have one entry per degree of freedom.
    pub fn interpolate<'a, T, D>(
        &self,
        mesh: &(impl FemMesh<T, D> + ?Sized),
        variable: usize,
        f: impl Fn(&OPoint<T, D>) -> T,
        u: impl Into<DVectorViewMut<'a, T>>,
    ) -> Result<(), ConfigurationError>
    where
        T: Real,
        D: SmallDim,
        DefaultAllocator: DimAllocator<T, D>,
    {
        let mut u = u.into();
        assert_eq!(u.len(), self.num_dofs(), "Vector must have one entry per degree of freedom");
        let fe_type = self.fe_types[variable];
        for element in 0..mesh.num_elements() {
            let basis = fe_type.reference_basis(mesh.element_shape(element), mesh.element_p_level(element))?;
            let geometry = element_geometry(mesh, element);
            for (&dof, node) in self
                .element_dofs(element, variable)
                .iter()
                .zip(basis.node_coordinates())
            {
                let xi = OPoint::from(OVector::<T, D>::from_fn(|i, _| convert(node[i])));
                u[dof] = f(&geometry.map_reference_coords(&xi));
            }
        }
        Ok(())
    }
}

impl DofMap for LagrangeDofMap {
    fn num_dofs(&self) -> usize {
        self.variable_offsets.last().copied().unwrap_or(0)
    }

    fn num_variables(&self) -> usize {
        self.fe_types.len()
    }

    fn num_elements(&self) -> usize {
        (self.offsets.len() - 1) / self.fe_types.len().max(1)
    }

    fn element_dofs(&self, element: usize, variable: usize) -> &[usize] {
        let i = element * self.fe_types.len() + variable;
        &self.dofs[self.offsets[i]..self.offsets[i + 1]]
    }
}
