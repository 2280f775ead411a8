//! Reference shapes, Lagrange bases and first-order element geometry.
//!
//! All shapes are volumetric: the reference dimension equals the dimension of the geometry.
//! The segment, quadrilateral and hexahedron are `[-1, 1]^d` with lexicographically ordered
//! corner vertices per face. The triangle and tetrahedron are the unit simplices spanned by the
//! origin and the coordinate unit vectors.
use crate::error::ConfigurationError;
use crate::Real;
use nalgebra::DMatrixViewMut;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};

mod geometry;
mod simplex;
mod tensor;

pub use geometry::ElementGeometry;

/// The highest order of discontinuous Lagrange elements on tensor-product shapes.
pub const MAX_TENSOR_ORDER: usize = 8;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementShape {
    Segment,
    Triangle,
    Quadrilateral,
    Tetrahedron,
    Hexahedron,
}

#[rustfmt::skip]
const SEGMENT_VERTICES: [[f64; 3]; 2] = [[-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
#[rustfmt::skip]
const TRIANGLE_VERTICES: [[f64; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
#[rustfmt::skip]
const QUADRILATERAL_VERTICES: [[f64; 3]; 4] = [
    [-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [1.0, 1.0, 0.0], [-1.0, 1.0, 0.0]
];
#[rustfmt::skip]
const TETRAHEDRON_VERTICES: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]
];
#[rustfmt::skip]
const HEXAHEDRON_VERTICES: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [-1.0, 1.0, -1.0],
    [-1.0, -1.0,  1.0], [1.0, -1.0,  1.0], [1.0, 1.0,  1.0], [-1.0, 1.0,  1.0],
];

const SEGMENT_SIDES: [&[usize]; 2] = [&[0], &[1]];
const TRIANGLE_SIDES: [&[usize]; 3] = [&[0, 1], &[1, 2], &[2, 0]];
const QUADRILATERAL_SIDES: [&[usize]; 4] = [&[0, 1], &[1, 2], &[2, 3], &[3, 0]];
const TETRAHEDRON_SIDES: [&[usize]; 4] = [&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[2, 0, 3]];
#[rustfmt::skip]
const HEXAHEDRON_SIDES: [&[usize]; 6] = [
    &[0, 1, 2, 3], &[0, 1, 5, 4], &[1, 2, 6, 5], &[2, 3, 7, 6], &[3, 0, 4, 7], &[4, 5, 6, 7]
];

// Outward normals of the reference sides, not normalized
const SEGMENT_NORMALS: [[f64; 3]; 2] = [[-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
const TRIANGLE_NORMALS: [[f64; 3]; 3] = [[0.0, -1.0, 0.0], [1.0, 1.0, 0.0], [-1.0, 0.0, 0.0]];
#[rustfmt::skip]
const QUADRILATERAL_NORMALS: [[f64; 3]; 4] = [
    [0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [-1.0, 0.0, 0.0]
];
#[rustfmt::skip]
const TETRAHEDRON_NORMALS: [[f64; 3]; 4] = [
    [0.0, 0.0, -1.0], [0.0, -1.0, 0.0], [1.0, 1.0, 1.0], [-1.0, 0.0, 0.0]
];
#[rustfmt::skip]
const HEXAHEDRON_NORMALS: [[f64; 3]; 6] = [
    [0.0, 0.0, -1.0], [0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]
];

impl ElementShape {
    pub fn reference_dim(&self) -> usize {
        match self {
            Self::Segment => 1,
            Self::Triangle | Self::Quadrilateral => 2,
            Self::Tetrahedron | Self::Hexahedron => 3,
        }
    }

    pub fn is_simplex(&self) -> bool {
        matches!(self, Self::Triangle | Self::Tetrahedron)
    }

    /// Reference coordinates of the vertices, padded with zeros to three components.
    pub fn reference_vertices(&self) -> &'static [[f64; 3]] {
        match self {
            Self::Segment => &SEGMENT_VERTICES,
            Self::Triangle => &TRIANGLE_VERTICES,
            Self::Quadrilateral => &QUADRILATERAL_VERTICES,
            Self::Tetrahedron => &TETRAHEDRON_VERTICES,
            Self::Hexahedron => &HEXAHEDRON_VERTICES,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.reference_vertices().len()
    }

    pub fn reference_centroid(&self) -> [f64; 3] {
        let vertices = self.reference_vertices();
        let n = vertices.len() as f64;
        let mut centroid = [0.0; 3];
        for v in vertices {
            for (c, v_c) in centroid.iter_mut().zip(v) {
                *c += v_c / n;
            }
        }
        centroid
    }

    pub fn num_sides(&self) -> usize {
        self.sides().len()
    }

    /// Local vertex indices of the given side.
    ///
    /// # Panics
    ///
    /// Panics if the side index is out of bounds.
    pub fn side_vertices(&self, side: usize) -> &'static [usize] {
        self.sides()[side]
    }

    /// The reference shape of the sides, or `None` for the point sides of a segment.
    pub fn side_shape(&self) -> Option<ElementShape> {
        match self {
            Self::Segment => None,
            Self::Triangle | Self::Quadrilateral => Some(Self::Segment),
            Self::Tetrahedron => Some(Self::Triangle),
            Self::Hexahedron => Some(Self::Quadrilateral),
        }
    }

    /// An outward normal of the reference side, padded with zeros to three components.
    ///
    /// The normal is not necessarily of unit length.
    pub fn reference_normal(&self, side: usize) -> &'static [f64; 3] {
        match self {
            Self::Segment => &SEGMENT_NORMALS[side],
            Self::Triangle => &TRIANGLE_NORMALS[side],
            Self::Quadrilateral => &QUADRILATERAL_NORMALS[side],
            Self::Tetrahedron => &TETRAHEDRON_NORMALS[side],
            Self::Hexahedron => &HEXAHEDRON_NORMALS[side],
        }
    }

    /// Whether the reference coordinates lie inside the reference shape, up to the tolerance.
    pub fn contains_reference_point<T: Real>(&self, xi: &[T], tolerance: T) -> bool {
        if self.is_simplex() {
            let sum = xi.iter().fold(T::zero(), |sum, &c| sum + c);
            xi.iter().all(|&c| c >= -tolerance) && sum <= T::one() + tolerance
        } else {
            xi.iter().all(|&c| c.abs() <= T::one() + tolerance)
        }
    }

    fn sides(&self) -> &'static [&'static [usize]] {
        match self {
            Self::Segment => &SEGMENT_SIDES,
            Self::Triangle => &TRIANGLE_SIDES,
            Self::Quadrilateral => &QUADRILATERAL_SIDES,
            Self::Tetrahedron => &TETRAHEDRON_SIDES,
            Self::Hexahedron => &HEXAHEDRON_SIDES,
        }
    }
}

impl Display for ElementShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Segment => "segment",
            Self::Triangle => "triangle",
            Self::Quadrilateral => "quadrilateral",
            Self::Tetrahedron => "tetrahedron",
            Self::Hexahedron => "hexahedron",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeFamily {
    /// Continuous nodal elements, sharing nodes between neighboring elements.
    Lagrange,
    /// Nodal elements whose degrees of freedom are local to each element.
    DiscontinuousLagrange,
}

/// The interpolation type of a variable.
///
/// Variables with identical types share their finite element evaluators.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeType {
    pub family: FeFamily,
    pub order: usize,
}

impl FeType {
    pub fn lagrange(order: usize) -> Self {
        Self {
            family: FeFamily::Lagrange,
            order,
        }
    }

    pub fn discontinuous_lagrange(order: usize) -> Self {
        Self {
            family: FeFamily::DiscontinuousLagrange,
            order,
        }
    }

    pub fn is_continuous(&self) -> bool {
        self.family == FeFamily::Lagrange
    }

    /// The polynomial order on an element with the given p-refinement level.
    pub fn effective_order(&self, p_level: usize) -> usize {
        self.order + p_level
    }

    /// Checks that the element type can be used on the shape at the given p-level.
    ///
    /// Continuous elements of order 1 and 2 are supported on every shape, but not with
    /// p-refinement. Discontinuous elements are supported up to [`MAX_TENSOR_ORDER`] on
    /// tensor-product shapes and up to order 2 on simplices.
    pub fn check_supported(&self, shape: ElementShape, p_level: usize) -> Result<(), ConfigurationError> {
        let order = self.effective_order(p_level);
        let supported = match self.family {
            FeFamily::Lagrange => p_level == 0 && (1..=2).contains(&order),
            FeFamily::DiscontinuousLagrange if shape.is_simplex() => order <= 2,
            FeFamily::DiscontinuousLagrange => order <= MAX_TENSOR_ORDER,
        };
        if supported {
            Ok(())
        } else {
            Err(ConfigurationError::UnsupportedFiniteElement {
                fe_type: *self,
                shape,
                p_level,
            })
        }
    }

    /// The reference basis of this element type on the shape at the given p-level.
    pub fn reference_basis(&self, shape: ElementShape, p_level: usize) -> Result<LagrangeBasis, ConfigurationError> {
        self.check_supported(shape, p_level)?;
        LagrangeBasis::new(shape, self.effective_order(p_level)).ok_or(ConfigurationError::UnsupportedFiniteElement {
            fe_type: *self,
            shape,
            p_level,
        })
    }
}

impl Display for FeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.family {
            FeFamily::Lagrange => write!(f, "Lagrange(order = {})", self.order),
            FeFamily::DiscontinuousLagrange => write!(f, "DiscontinuousLagrange(order = {})", self.order),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BasisKind {
    Tensor(tensor::TensorNodes),
    Simplex,
}

/// A nodal Lagrange basis on a reference shape.
///
/// Nodes are ordered with the shape's vertices first (in reference vertex order), so that the
/// first-order basis is the vertex basis used for the element geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LagrangeBasis {
    shape: ElementShape,
    order: usize,
    kind: BasisKind,
}

impl LagrangeBasis {
    /// The basis of the given order on the shape, if available.
    pub fn new(shape: ElementShape, order: usize) -> Option<Self> {
        let kind = if shape.is_simplex() {
            (order <= 2).then_some(BasisKind::Simplex)?
        } else {
            (order <= MAX_TENSOR_ORDER).then(|| BasisKind::Tensor(tensor::TensorNodes::new(shape, order)))?
        };
        Some(Self { shape, order, kind })
    }

    /// The first-order basis associated with the vertices of the shape.
    pub fn vertex_basis(shape: ElementShape) -> Self {
        let kind = if shape.is_simplex() {
            BasisKind::Simplex
        } else {
            BasisKind::Tensor(tensor::TensorNodes::new(shape, 1))
        };
        Self { shape, order: 1, kind }
    }

    pub fn shape(&self) -> ElementShape {
        self.shape
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn reference_dim(&self) -> usize {
        self.shape.reference_dim()
    }

    pub fn num_nodes(&self) -> usize {
        match &self.kind {
            BasisKind::Tensor(nodes) => nodes.len(),
            BasisKind::Simplex => simplex::num_nodes(self.shape, self.order),
        }
    }

    /// Reference coordinates of the nodes, padded with zeros to three components.
    pub fn node_coordinates(&self) -> Vec<[f64; 3]> {
        match &self.kind {
            BasisKind::Tensor(nodes) => nodes.coordinates(),
            BasisKind::Simplex => simplex::node_coordinates(self.shape, self.order),
        }
    }

    /// Local vertex indices of the lowest-dimensional reference entity containing the node.
    ///
    /// Vertex nodes are supported by their vertex, edge nodes by the edge's two vertices and so
    /// on. Nodes strictly inside the shape are supported by all vertices.
    pub fn node_support(&self, node: usize) -> Vec<usize> {
        match &self.kind {
            BasisKind::Tensor(nodes) => nodes.support(node),
            BasisKind::Simplex => simplex::node_support(self.shape, self.order, node),
        }
    }

    /// Evaluates each basis function at the given reference coordinates.
    ///
    /// # Panics
    ///
    /// Panics if `values` does not have exactly one entry per node.
    pub fn populate_basis<T: Real>(&self, values: &mut [T], xi: &[T]) {
        assert_eq!(values.len(), self.num_nodes());
        match &self.kind {
            BasisKind::Tensor(nodes) => nodes.populate_basis(values, xi),
            BasisKind::Simplex => simplex::populate_basis(self.shape, self.order, values, xi),
        }
    }

    /// Populates the columns of `gradients` with the reference gradients of each basis function.
    ///
    /// # Panics
    ///
    /// Panics if `gradients` is not a `d x n` matrix, with `d` the reference dimension and `n`
    /// the number of nodes.
    pub fn populate_basis_gradients<T: Real>(&self, mut gradients: DMatrixViewMut<T>, xi: &[T]) {
        assert_eq!(gradients.nrows(), self.reference_dim());
        assert_eq!(gradients.ncols(), self.num_nodes());
        match &self.kind {
            BasisKind::Tensor(nodes) => nodes.populate_basis_gradients(&mut gradients, xi),
            BasisKind::Simplex => simplex::populate_basis_gradients(self.shape, self.order, &mut gradients, xi),
        }
    }

    /// Populates the columns of `hessians` with the reference hessians of each basis function,
    /// each stored in column-major order.
    ///
    /// # Panics
    ///
    /// Panics if `hessians` is not a `d^2 x n` matrix, with `d` the reference dimension and `n`
    /// the number of nodes.
    pub fn populate_basis_hessians<T: Real>(&self, mut hessians: DMatrixViewMut<T>, xi: &[T]) {
        let d = self.reference_dim();
        assert_eq!(hessians.nrows(), d * d);
        assert_eq!(hessians.ncols(), self.num_nodes());
        match &self.kind {
            BasisKind::Tensor(nodes) => nodes.populate_basis_hessians(&mut hessians, xi),
            BasisKind::Simplex => simplex::populate_basis_hessians(self.shape, self.order, &mut hessians, xi),
        }
    }
}
