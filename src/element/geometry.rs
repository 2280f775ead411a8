use crate::allocators::DimAllocator;
use crate::element::{ElementShape, LagrangeBasis};
use crate::{Real, SmallDim};
use itertools::izip;
use nalgebra::{convert, DMatrix, DMatrixViewMut, DefaultAllocator, OMatrix, OPoint, OVector, Scalar};

const MAX_NEWTON_ITERATIONS: usize = 50;

/// The first-order geometry of an element, interpolating its vertices with the vertex basis of
/// the reference shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementGeometry<T, D>
where
    T: Scalar,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    shape: ElementShape,
    vertices: Vec<OPoint<T, D>>,
    basis: LagrangeBasis,
}

impl<T, D> ElementGeometry<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Constructs the geometry of an element with the given shape and vertices.
    ///
    /// # Panics
    ///
    /// Panics if the dimension of the shape does not match `D`, or if the number of vertices
    /// does not match the shape.
    pub fn new(shape: ElementShape, vertices: Vec<OPoint<T, D>>) -> Self {
        assert_eq!(shape.reference_dim(), D::dim(), "Shape dimension must match geometry dimension");
        assert_eq!(vertices.len(), shape.num_vertices(), "Vertex count must match shape");
        Self {
            shape,
            vertices,
            basis: LagrangeBasis::vertex_basis(shape),
        }
    }

    pub fn shape(&self) -> ElementShape {
        self.shape
    }

    pub fn vertices(&self) -> &[OPoint<T, D>] {
        &self.vertices
    }

    /// Reference coordinates of the reference centroid.
    pub fn reference_centroid(&self) -> OPoint<T, D> {
        let centroid = self.shape.reference_centroid();
        OPoint::from(OVector::<T, D>::from_fn(|i, _| convert(centroid[i])))
    }

    pub fn map_reference_coords(&self, xi: &OPoint<T, D>) -> OPoint<T, D> {
        let mut phi = vec![T::zero(); self.vertices.len()];
        self.basis.populate_basis(&mut phi, xi.coords.as_slice());
        let mut x = OVector::<T, D>::zeros();
        for (v, &phi_v) in izip!(&self.vertices, &phi) {
            x += &v.coords * phi_v;
        }
        OPoint::from(x)
    }

    /// The Jacobian `J_ij = dx_i / dxi_j` of the reference-to-physical map.
    pub fn reference_jacobian(&self, xi: &OPoint<T, D>) -> OMatrix<T, D, D> {
        let d = D::dim();
        let mut gradients = DMatrix::zeros(d, self.vertices.len());
        self.basis
            .populate_basis_gradients(DMatrixViewMut::from(&mut gradients), xi.coords.as_slice());

        let mut jacobian = OMatrix::<T, D, D>::zeros();
        for (v, grad) in izip!(&self.vertices, gradients.column_iter()) {
            for i in 0..d {
                for j in 0..d {
                    jacobian[(i, j)] += v[i] * grad[j];
                }
            }
        }
        jacobian
    }

    /// The second derivatives `d^2 x_k / dxi^2` of each component `k` of the reference map.
    pub fn reference_hessians(&self, xi: &OPoint<T, D>) -> Vec<OMatrix<T, D, D>> {
        let d = D::dim();
        let mut hessians = DMatrix::zeros(d * d, self.vertices.len());
        self.basis
            .populate_basis_hessians(DMatrixViewMut::from(&mut hessians), xi.coords.as_slice());

        (0..d)
            .map(|k| {
                let mut h_k = OMatrix::<T, D, D>::zeros();
                for (v, hess) in izip!(&self.vertices, hessians.column_iter()) {
                    for a in 0..d {
                        for b in 0..d {
                            h_k[(a, b)] += v[k] * hess[a + d * b];
                        }
                    }
                }
                h_k
            })
            .collect()
    }

    /// The largest distance between any two vertices.
    pub fn diameter(&self) -> T {
        let mut diameter = T::zero();
        for (i, a) in self.vertices.iter().enumerate() {
            for b in &self.vertices[i + 1..] {
                diameter = diameter.max((&b.coords - &a.coords).norm());
            }
        }
        diameter
    }

    /// Maps a physical point back to reference coordinates with Newton's method.
    ///
    /// Returns `None` if the iteration does not converge or encounters a singular Jacobian.
    /// The returned reference point is not guaranteed to lie inside the reference shape.
    pub fn map_physical_coords(&self, x: &OPoint<T, D>) -> Option<OPoint<T, D>> {
        let tolerance = T::default_epsilon() * convert(1e3);
        let mut xi = self.reference_centroid();
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let residual = self.map_reference_coords(&xi) - x;
            let step = self.reference_jacobian(&xi).lu().solve(&residual)?;
            if !step.iter().all(|s| s.is_finite()) {
                return None;
            }
            xi.coords -= &step;
            if step.norm() <= tolerance {
                return Some(xi);
            }
        }
        None
    }
}
