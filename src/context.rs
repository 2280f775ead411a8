//! The per-element evaluation context handed to physics callbacks and postprocessors.
//!
//! An [`ElementContext`] is owned by exactly one assembly worker. It holds the element currently
//! being visited, the selected quadrature rules, finite element values at the quadrature points
//! and local copies of the current and fixed solution coefficients. Reinitializing the context
//! for a new element discards everything derived from the previous one, so that no query can
//! observe stale data.
use crate::allocators::DimAllocator;
use crate::assembly::local::LocalSystem;
use crate::dof_map::DofMap;
use crate::element::{ElementGeometry, ElementShape, FeType, LagrangeBasis};
use crate::error::{AssemblyError, ConfigurationError, EvaluationError};
use crate::mesh::{element_geometry, FemMesh};
use crate::quadrature::{
    max_effective_order, select_quadrature_strength, ElementQuadrature, QuadratureCache, SideQuadrature,
};
use crate::system::FemSystemSettings;
use crate::{Real, SmallDim};
use itertools::izip;
use nalgebra::{
    try_convert_ref, DMatrix, DMatrixViewMut, DVector, DVectorView, DefaultAllocator, OMatrix, OPoint, OVector, Scalar,
};
use std::ops::Range;
use std::sync::Arc;

/// Read-only views of the current and fixed solution vectors.
///
/// The current state is the nonlinear iterate being assembled. The fixed state is the last
/// accepted solution, used for example by time-stepping schemes.
#[derive(Debug, Clone, Copy)]
pub struct SolutionState<'a, T: Scalar> {
    current: DVectorView<'a, T>,
    fixed: DVectorView<'a, T>,
}

impl<'a, T: Scalar> SolutionState<'a, T> {
    /// # Panics
    ///
    /// Panics if the two vectors have different lengths.
    pub fn new(current: impl Into<DVectorView<'a, T>>, fixed: impl Into<DVectorView<'a, T>>) -> Self {
        let current = current.into();
        let fixed = fixed.into();
        assert_eq!(current.len(), fixed.len(), "Current and fixed solutions must have the same length");
        Self { current, fixed }
    }

    /// A state whose fixed solution coincides with the current one.
    pub fn steady(current: impl Into<DVectorView<'a, T>>) -> Self {
        let current = current.into();
        Self { current: current.clone(), fixed: current }
    }

    pub fn current(&self) -> &DVectorView<'a, T> {
        &self.current
    }

    pub fn fixed(&self) -> &DVectorView<'a, T> {
        &self.fixed
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Solution {
    Current,
    Fixed,
}

/// Basis function values, gradients and hessians of one element type at a set of points.
///
/// Stored point by point, so that entry `qp * num_nodes + i` belongs to basis function `i` at
/// point `qp`.
#[derive(Debug, Clone)]
struct FeValues<T, D>
where
    T: Scalar,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    num_nodes: usize,
    values: Vec<T>,
    gradients: Vec<OVector<T, D>>,
    hessians: Vec<OMatrix<T, D, D>>,
}

impl<T, D> FeValues<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn new(num_nodes: usize) -> Self {
        Self {
            num_nodes,
            values: Vec::new(),
            gradients: Vec::new(),
            hessians: Vec::new(),
        }
    }

    /// Appends the values at the reference point `xi`, mapped to physical derivatives with the
    /// inverse Jacobian and (for hessians) the second derivatives of the element map.
    fn push_point(
        &mut self,
        basis: &LagrangeBasis,
        xi: &OPoint<T, D>,
        j_inv: &OMatrix<T, D, D>,
        map_hessians: Option<&[OMatrix<T, D, D>]>,
    ) {
        let n = self.num_nodes;
        let d = D::dim();
        let xi = xi.coords.as_slice();
        let j_inv_t = j_inv.transpose();

        let mut phi = vec![T::zero(); n];
        basis.populate_basis(&mut phi, xi);
        self.values.extend(phi);

        let mut reference_gradients = DMatrix::zeros(d, n);
        basis.populate_basis_gradients(DMatrixViewMut::from(&mut reference_gradients), xi);
        let gradients: Vec<OVector<T, D>> = reference_gradients
            .column_iter()
            .map(|g_ref| &j_inv_t * OVector::<T, D>::from_iterator(g_ref.iter().copied()))
            .collect();

        if let Some(map_hessians) = map_hessians {
            // H = J^-T (H_ref - sum_k g_k d2x_k/dxi2) J^-1
            let mut reference_hessians = DMatrix::zeros(d * d, n);
            basis.populate_basis_hessians(DMatrixViewMut::from(&mut reference_hessians), xi);
            for (h_ref, g) in izip!(reference_hessians.column_iter(), &gradients) {
                let mut h = OMatrix::<T, D, D>::from_iterator(h_ref.iter().copied());
                for (k, x_k_hessian) in map_hessians.iter().enumerate() {
                    h -= x_k_hessian * g[k];
                }
                self.hessians.push(&j_inv_t * h * j_inv);
            }
        }

        self.gradients.extend(gradients);
    }

    fn point_range(&self, qp: usize) -> Range<usize> {
        qp * self.num_nodes..(qp + 1) * self.num_nodes
    }

    fn value(&self, qp: usize, coefficients: &DVectorView<T>) -> T {
        izip!(&self.values[self.point_range(qp)], coefficients.iter()).fold(T::zero(), |u, (&phi, &c)| u + phi * c)
    }

    fn gradient(&self, qp: usize, coefficients: &DVectorView<T>) -> OVector<T, D> {
        let mut gradient = OVector::<T, D>::zeros();
        for (dphi, &c) in izip!(&self.gradients[self.point_range(qp)], coefficients.iter()) {
            gradient += dphi * c;
        }
        gradient
    }

    fn hessian(&self, qp: usize, coefficients: &DVectorView<T>) -> OMatrix<T, D, D> {
        let mut hessian = OMatrix::<T, D, D>::zeros();
        for (d2phi, &c) in izip!(&self.hessians_at(qp)[..], coefficients.iter()) {
            hessian += d2phi * c;
        }
        hessian
    }

    fn hessians_at(&self, qp: usize) -> &[OMatrix<T, D, D>] {
        assert!(
            !self.hessians.is_empty(),
            "Second derivatives are disabled (see FemSystemSettings::second_derivatives)"
        );
        &self.hessians[self.point_range(qp)]
    }
}

/// Quadrature data of the element interior or of one side.
#[derive(Debug, Clone)]
struct QuadratureValues<T, D>
where
    T: Scalar,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    jxw: Vec<T>,
    points: Vec<OPoint<T, D>>,
    normals: Vec<OVector<T, D>>,
    // One entry per distinct element type
    fe: Vec<FeValues<T, D>>,
}

#[derive(Debug, Clone)]
struct ActiveElement<T, D>
where
    T: Scalar,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    index: usize,
    p_level: usize,
    geometry: ElementGeometry<T, D>,
    quadrature: Arc<ElementQuadrature<T, D>>,
    // One entry per distinct element type
    bases: Vec<LagrangeBasis>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveSide {
    index: usize,
    neighbor: Option<usize>,
}

fn side_measure<T, D>(jacobian: &OMatrix<T, D, D>, tangents: &DMatrix<T>) -> T
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    if tangents.ncols() == 0 {
        return T::one();
    }
    let d = D::dim();
    let j = DMatrix::from_iterator(d, d, jacobian.iter().copied());
    let jt = j * tangents;
    (jt.transpose() * &jt).determinant().sqrt()
}

/// The evaluation context for a single element and, during side iterations, a single side.
#[derive(Debug, Clone)]
pub struct ElementContext<T, D>
where
    T: Scalar,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fe_types: Vec<FeType>,
    time_evolving: Vec<bool>,
    distinct_fe_types: Vec<FeType>,
    fe_index: Vec<usize>,
    second_derivatives: bool,
    extra_quadrature_order: i32,
    quadrature_cache: QuadratureCache<T, D>,

    element: Option<ActiveElement<T, D>>,
    side: Option<ActiveSide>,
    interior_values: Option<QuadratureValues<T, D>>,
    side_values: Option<QuadratureValues<T, D>>,

    dofs: Vec<usize>,
    variable_ranges: Vec<Range<usize>>,
    current: DVector<T>,
    fixed: DVector<T>,
}

impl<T, D> ElementContext<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Creates an inactive context for variables of the given types.
    ///
    /// # Panics
    ///
    /// Panics if `time_evolving` does not have one entry per variable.
    pub fn new(fe_types: &[FeType], time_evolving: &[bool], settings: &FemSystemSettings<T>) -> Self {
        assert_eq!(fe_types.len(), time_evolving.len(), "Need one time-evolving flag per variable");
        let mut distinct_fe_types = Vec::new();
        let fe_index = fe_types
            .iter()
            .map(|fe_type| {
                distinct_fe_types
                    .iter()
                    .position(|t| t == fe_type)
                    .unwrap_or_else(|| {
                        distinct_fe_types.push(*fe_type);
                        distinct_fe_types.len() - 1
                    })
            })
            .collect();

        Self {
            fe_types: fe_types.to_vec(),
            time_evolving: time_evolving.to_vec(),
            distinct_fe_types,
            fe_index,
            second_derivatives: settings.second_derivatives,
            extra_quadrature_order: settings.extra_quadrature_order,
            quadrature_cache: QuadratureCache::default(),
            element: None,
            side: None,
            interior_values: None,
            side_values: None,
            dofs: Vec::new(),
            variable_ranges: Vec::new(),
            current: DVector::zeros(0),
            fixed: DVector::zeros(0),
        }
    }

    /// Makes `element` the current element.
    ///
    /// Selects the quadrature rules, sets up the element geometry and gathers the local
    /// coefficients of both solution states. Finite element values are not computed; see
    /// [`reinit_interior_fe`](Self::reinit_interior_fe) and
    /// [`reinit_side_fe`](Self::reinit_side_fe).
    pub fn reinit_element<M, Map>(
        &mut self,
        mesh: &M,
        dof_map: &Map,
        element: usize,
        state: &SolutionState<T>,
    ) -> Result<(), ConfigurationError>
    where
        M: ?Sized + FemMesh<T, D>,
        Map: ?Sized + DofMap,
    {
        self.element = None;
        self.side = None;
        self.interior_values = None;
        self.side_values = None;

        let shape = mesh.element_shape(element);
        let p_level = mesh.element_p_level(element);
        let bases = self
            .distinct_fe_types
            .iter()
            .map(|fe_type| fe_type.reference_basis(shape, p_level))
            .collect::<Result<Vec<_>, _>>()?;
        let strength =
            select_quadrature_strength(max_effective_order(&self.fe_types, p_level), self.extra_quadrature_order);
        let quadrature = self.quadrature_cache.get_or_compute(shape, strength)?;

        self.dofs.clear();
        self.variable_ranges.clear();
        for (variable, &fe_index) in self.fe_index.iter().enumerate() {
            let dofs = dof_map.element_dofs(element, variable);
            let expected = bases[fe_index].num_nodes();
            if dofs.len() != expected {
                return Err(ConfigurationError::DofMapMismatch {
                    quantity: "element degrees of freedom",
                    expected,
                    actual: dofs.len(),
                });
            }
            let start = self.dofs.len();
            self.dofs.extend_from_slice(dofs);
            self.variable_ranges.push(start..self.dofs.len());
        }

        let n = self.dofs.len();
        self.current = DVector::from_iterator(n, self.dofs.iter().map(|&i| state.current()[i]));
        self.fixed = DVector::from_iterator(n, self.dofs.iter().map(|&i| state.fixed()[i]));
        self.element = Some(ActiveElement {
            index: element,
            p_level,
            geometry: element_geometry(mesh, element),
            quadrature,
            bases,
        });
        Ok(())
    }

    /// Computes finite element values at the default interior quadrature points.
    ///
    /// # Panics
    ///
    /// Panics if there is no current element.
    pub fn reinit_interior_fe(&mut self) -> Result<(), AssemblyError> {
        let quadrature = Arc::clone(&self.active_element().quadrature);
        self.reinit_interior_fe_with_rule(quadrature.interior_weights(), quadrature.interior_points())
    }

    /// Computes finite element values at the given reference points instead of the default
    /// interior rule.
    ///
    /// # Panics
    ///
    /// Panics if there is no current element, or if the number of weights and points differ.
    pub fn reinit_interior_fe_with_rule(&mut self, weights: &[T], points: &[OPoint<T, D>]) -> Result<(), AssemblyError> {
        self.interior_values = None;
        let values = self.compute_values(weights, points, None)?;
        self.interior_values = Some(values);
        Ok(())
    }

    /// Makes `side` the current side of the current element. `neighbor` is the element across
    /// the side, if any.
    ///
    /// # Panics
    ///
    /// Panics if there is no current element or the side index is out of bounds.
    pub fn reinit_side(&mut self, side: usize, neighbor: Option<usize>) {
        assert!(
            side < self.element_shape().num_sides(),
            "Side index out of bounds for the current element"
        );
        self.side_values = None;
        self.side = Some(ActiveSide { index: side, neighbor });
    }

    /// Computes finite element values at the side quadrature points of the current side.
    ///
    /// # Panics
    ///
    /// Panics if there is no current side.
    pub fn reinit_side_fe(&mut self) -> Result<(), AssemblyError> {
        let side = self.active_side().index;
        let quadrature = Arc::clone(&self.active_element().quadrature);
        let side_quadrature = quadrature.side(side);
        self.side_values = None;
        let values = self.compute_values(side_quadrature.weights(), side_quadrature.points(), Some(side_quadrature))?;
        self.side_values = Some(values);
        Ok(())
    }

    /// Leaves the current side, keeping the current element.
    pub fn clear_side(&mut self) {
        self.side = None;
        self.side_values = None;
    }

    /// Deactivates the context.
    pub fn clear(&mut self) {
        self.element = None;
        self.clear_side();
        self.interior_values = None;
    }

    fn compute_values(
        &self,
        weights: &[T],
        points: &[OPoint<T, D>],
        side: Option<&SideQuadrature<T, D>>,
    ) -> Result<QuadratureValues<T, D>, AssemblyError> {
        assert_eq!(weights.len(), points.len(), "Need one weight per quadrature point");
        let element = self.active_element();
        let geometry = &element.geometry;
        let mut values = QuadratureValues {
            jxw: Vec::with_capacity(points.len()),
            points: Vec::with_capacity(points.len()),
            normals: Vec::new(),
            fe: element
                .bases
                .iter()
                .map(|basis| FeValues::new(basis.num_nodes()))
                .collect(),
        };

        for (&w, xi) in izip!(weights, points) {
            let j = geometry.reference_jacobian(xi);
            let det = j.determinant();
            let degenerate = || AssemblyError::DegenerateElement {
                element: element.index,
                determinant: try_convert_ref(&det).unwrap_or(f64::NAN),
            };
            if !(det > T::zero() && det.is_finite()) {
                return Err(degenerate());
            }
            let j_inv = j.clone().try_inverse().ok_or_else(degenerate)?;

            let measure = match side {
                Some(side) => side_measure(&j, side.tangents()),
                None => det,
            };
            values.jxw.push(w * measure);
            values.points.push(geometry.map_reference_coords(xi));
            if let Some(side) = side {
                values
                    .normals
                    .push((j_inv.transpose() * side.reference_normal()).normalize());
            }

            let map_hessians = self.second_derivatives.then(|| geometry.reference_hessians(xi));
            for (basis, fe) in izip!(&element.bases, &mut values.fe) {
                fe.push_point(basis, xi, &j_inv, map_hessians.as_deref());
            }
        }

        Ok(values)
    }

    fn active_element(&self) -> &ActiveElement<T, D> {
        self.element
            .as_ref()
            .expect("The context has no current element")
    }

    fn active_side(&self) -> &ActiveSide {
        self.side.as_ref().expect("The context has no current side")
    }

    fn interior(&self) -> &QuadratureValues<T, D> {
        self.interior_values
            .as_ref()
            .expect("Interior finite element values have not been initialized for the current element")
    }

    fn side_quadrature_values(&self) -> &QuadratureValues<T, D> {
        self.side_values
            .as_ref()
            .expect("Side finite element values have not been initialized for the current side")
    }

    fn coefficients(&self, variable: usize, solution: Solution) -> DVectorView<T> {
        let range = self.variable_ranges[variable].clone();
        let coefficients = match solution {
            Solution::Current => &self.current,
            Solution::Fixed => &self.fixed,
        };
        coefficients.rows(range.start, range.len())
    }

    fn fe_values<'a>(&self, values: &'a QuadratureValues<T, D>, variable: usize) -> &'a FeValues<T, D> {
        &values.fe[self.fe_index[variable]]
    }
}

/// Element, side and degree-of-freedom information.
impl<T, D> ElementContext<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn num_variables(&self) -> usize {
        self.fe_types.len()
    }

    pub fn fe_type(&self, variable: usize) -> FeType {
        self.fe_types[variable]
    }

    pub fn is_time_evolving(&self, variable: usize) -> bool {
        self.time_evolving[variable]
    }

    /// The distinct element types among the variables, each evaluated once per point.
    pub fn distinct_fe_types(&self) -> &[FeType] {
        &self.distinct_fe_types
    }

    pub fn has_element(&self) -> bool {
        self.element.is_some()
    }

    pub fn has_side(&self) -> bool {
        self.side.is_some()
    }

    pub fn element_index(&self) -> usize {
        self.active_element().index
    }

    pub fn element_shape(&self) -> ElementShape {
        self.active_element().geometry.shape()
    }

    pub fn p_level(&self) -> usize {
        self.active_element().p_level
    }

    pub fn geometry(&self) -> &ElementGeometry<T, D> {
        &self.active_element().geometry
    }

    /// The quadrature rules selected for the current element.
    pub fn quadrature(&self) -> &ElementQuadrature<T, D> {
        &self.active_element().quadrature
    }

    pub fn side_index(&self) -> usize {
        self.active_side().index
    }

    /// The element across the current side, or `None` on the domain boundary.
    pub fn side_neighbor(&self) -> Option<usize> {
        self.active_side().neighbor
    }

    pub fn side_on_boundary(&self) -> bool {
        self.side_neighbor().is_none()
    }

    /// Global indices of the local degrees of freedom, grouped by variable.
    pub fn dof_indices(&self) -> &[usize] {
        &self.dofs
    }

    pub fn num_local_dofs(&self) -> usize {
        self.dofs.len()
    }

    /// The local indices of the variable's degrees of freedom.
    pub fn variable_dofs(&self, variable: usize) -> Range<usize> {
        self.variable_ranges[variable].clone()
    }

    pub fn num_variable_dofs(&self, variable: usize) -> usize {
        self.variable_ranges[variable].len()
    }

    pub fn current_coefficients(&self, variable: usize) -> DVectorView<T> {
        self.coefficients(variable, Solution::Current)
    }

    pub fn fixed_coefficients(&self, variable: usize) -> DVectorView<T> {
        self.coefficients(variable, Solution::Fixed)
    }

    /// A zeroed local system with the degree-of-freedom layout of the current element.
    pub fn new_local_system(&self) -> LocalSystem<T> {
        LocalSystem::new(self.variable_ranges.clone())
    }

    pub(crate) fn local_current(&self) -> &DVector<T> {
        &self.current
    }

    pub(crate) fn set_local_current(&mut self, values: DVectorView<T>) {
        self.current.copy_from(&values);
    }
}

/// Quadrature data and basis functions.
impl<T, D> ElementContext<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn num_interior_qps(&self) -> usize {
        self.interior().jxw.len()
    }

    /// Quadrature weights times the Jacobian determinant at the interior points.
    pub fn interior_jxw(&self) -> &[T] {
        &self.interior().jxw
    }

    /// Physical coordinates of the interior quadrature points.
    pub fn interior_points(&self) -> &[OPoint<T, D>] {
        &self.interior().points
    }

    pub fn interior_phi(&self, variable: usize, i: usize, qp: usize) -> T {
        let fe = self.fe_values(self.interior(), variable);
        fe.values[fe.point_range(qp)][i]
    }

    pub fn interior_dphi(&self, variable: usize, i: usize, qp: usize) -> &OVector<T, D> {
        let fe = self.fe_values(self.interior(), variable);
        &fe.gradients[fe.point_range(qp)][i]
    }

    pub fn interior_d2phi(&self, variable: usize, i: usize, qp: usize) -> &OMatrix<T, D, D> {
        &self.fe_values(self.interior(), variable).hessians_at(qp)[i]
    }

    pub fn num_side_qps(&self) -> usize {
        self.side_quadrature_values().jxw.len()
    }

    /// Quadrature weights times the side measure at the side points.
    pub fn side_jxw(&self) -> &[T] {
        &self.side_quadrature_values().jxw
    }

    pub fn side_points(&self) -> &[OPoint<T, D>] {
        &self.side_quadrature_values().points
    }

    /// Outward unit normals at the side points.
    pub fn side_normals(&self) -> &[OVector<T, D>] {
        &self.side_quadrature_values().normals
    }

    pub fn side_phi(&self, variable: usize, i: usize, qp: usize) -> T {
        let fe = self.fe_values(self.side_quadrature_values(), variable);
        fe.values[fe.point_range(qp)][i]
    }

    pub fn side_dphi(&self, variable: usize, i: usize, qp: usize) -> &OVector<T, D> {
        let fe = self.fe_values(self.side_quadrature_values(), variable);
        &fe.gradients[fe.point_range(qp)][i]
    }

    pub fn side_d2phi(&self, variable: usize, i: usize, qp: usize) -> &OMatrix<T, D, D> {
        &self
            .fe_values(self.side_quadrature_values(), variable)
            .hessians_at(qp)[i]
    }
}

/// Interpolation of the current and fixed solutions.
///
/// Values are computed on demand from the local coefficients, so they always reflect the
/// coefficients of the current element.
///
/// # Panics
///
/// All queries panic if the corresponding finite element values have not been initialized for
/// the current element or side. Hessian queries also panic if second derivatives are disabled.
impl<T, D> ElementContext<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    pub fn interior_value(&self, variable: usize, qp: usize) -> T {
        self.fe_values(self.interior(), variable)
            .value(qp, &self.current_coefficients(variable))
    }

    pub fn interior_gradient(&self, variable: usize, qp: usize) -> OVector<T, D> {
        self.fe_values(self.interior(), variable)
            .gradient(qp, &self.current_coefficients(variable))
    }

    pub fn interior_hessian(&self, variable: usize, qp: usize) -> OMatrix<T, D, D> {
        self.fe_values(self.interior(), variable)
            .hessian(qp, &self.current_coefficients(variable))
    }

    pub fn fixed_interior_value(&self, variable: usize, qp: usize) -> T {
        self.fe_values(self.interior(), variable)
            .value(qp, &self.fixed_coefficients(variable))
    }

    pub fn fixed_interior_gradient(&self, variable: usize, qp: usize) -> OVector<T, D> {
        self.fe_values(self.interior(), variable)
            .gradient(qp, &self.fixed_coefficients(variable))
    }

    pub fn fixed_interior_hessian(&self, variable: usize, qp: usize) -> OMatrix<T, D, D> {
        self.fe_values(self.interior(), variable)
            .hessian(qp, &self.fixed_coefficients(variable))
    }

    pub fn side_value(&self, variable: usize, qp: usize) -> T {
        self.fe_values(self.side_quadrature_values(), variable)
            .value(qp, &self.current_coefficients(variable))
    }

    pub fn side_gradient(&self, variable: usize, qp: usize) -> OVector<T, D> {
        self.fe_values(self.side_quadrature_values(), variable)
            .gradient(qp, &self.current_coefficients(variable))
    }

    pub fn side_hessian(&self, variable: usize, qp: usize) -> OMatrix<T, D, D> {
        self.fe_values(self.side_quadrature_values(), variable)
            .hessian(qp, &self.current_coefficients(variable))
    }

    pub fn fixed_side_value(&self, variable: usize, qp: usize) -> T {
        self.fe_values(self.side_quadrature_values(), variable)
            .value(qp, &self.fixed_coefficients(variable))
    }

    pub fn fixed_side_gradient(&self, variable: usize, qp: usize) -> OVector<T, D> {
        self.fe_values(self.side_quadrature_values(), variable)
            .gradient(qp, &self.fixed_coefficients(variable))
    }

    pub fn fixed_side_hessian(&self, variable: usize, qp: usize) -> OMatrix<T, D, D> {
        self.fe_values(self.side_quadrature_values(), variable)
            .hessian(qp, &self.fixed_coefficients(variable))
    }

    /// The value of the current solution at a physical point inside the current element.
    pub fn point_value(&self, variable: usize, x: &OPoint<T, D>) -> Result<T, EvaluationError> {
        let values = self.point_fe_values(variable, x)?;
        Ok(values.value(0, &self.current_coefficients(variable)))
    }

    /// The gradient of the current solution at a physical point inside the current element.
    pub fn point_gradient(&self, variable: usize, x: &OPoint<T, D>) -> Result<OVector<T, D>, EvaluationError> {
        let values = self.point_fe_values(variable, x)?;
        Ok(values.gradient(0, &self.current_coefficients(variable)))
    }

    pub fn fixed_point_value(&self, variable: usize, x: &OPoint<T, D>) -> Result<T, EvaluationError> {
        let values = self.point_fe_values(variable, x)?;
        Ok(values.value(0, &self.fixed_coefficients(variable)))
    }

    pub fn fixed_point_gradient(&self, variable: usize, x: &OPoint<T, D>) -> Result<OVector<T, D>, EvaluationError> {
        let values = self.point_fe_values(variable, x)?;
        Ok(values.gradient(0, &self.fixed_coefficients(variable)))
    }

    fn point_fe_values(&self, variable: usize, x: &OPoint<T, D>) -> Result<FeValues<T, D>, EvaluationError> {
        let element = self.active_element();
        let geometry = &element.geometry;
        let inverse_map_failed = EvaluationError::InverseMapFailed { element: element.index };
        let xi = geometry
            .map_physical_coords(x)
            .ok_or(inverse_map_failed.clone())?;
        let tolerance = T::default_epsilon().sqrt();
        if !geometry
            .shape()
            .contains_reference_point(xi.coords.as_slice(), tolerance)
        {
            return Err(EvaluationError::PointOutsideElement { element: element.index });
        }

        let basis = &element.bases[self.fe_index[variable]];
        let j_inv = geometry
            .reference_jacobian(&xi)
            .try_inverse()
            .ok_or(inverse_map_failed)?;
        let mut values = FeValues::new(basis.num_nodes());
        values.push_point(basis, &xi, &j_inv, None);
        Ok(values)
    }
}
