//! Selection of interior and side quadrature rules.
//!
//! The rules are generated by `femsystem-quadrature` in `f64` and converted to the scalar type of
//! the system. Side rules are the rules of the side's reference shape, mapped into the reference
//! coordinates of the element for every side.
use crate::allocators::DimAllocator;
use crate::element::{ElementShape, FeType, LagrangeBasis};
use crate::error::ConfigurationError;
use crate::{Real, SmallDim};
use femsystem_quadrature::{checked_gauss_points_for_strength, simplex, tensor, univariate};
use nalgebra::{convert, DMatrix, DMatrixViewMut, DefaultAllocator, OPoint, OVector, Scalar};
use rustc_hash::FxHashMap;
use std::sync::Arc;

pub type QuadraturePair<T, D> = (Vec<T>, Vec<OPoint<T, D>>);

type ReferenceRule = (Vec<f64>, Vec<[f64; 3]>);

/// The strength `q = max(0, 2p + 1 + extra)` needed for variables of highest order `p`.
pub fn select_quadrature_strength(max_order: usize, extra_quadrature_order: i32) -> usize {
    let strength = 2 * max_order as i64 + 1 + i64::from(extra_quadrature_order);
    strength.max(0) as usize
}

/// The highest order among the given element types on an element with the given p-level.
pub fn max_effective_order(fe_types: &[FeType], p_level: usize) -> usize {
    fe_types
        .iter()
        .map(|fe_type| fe_type.effective_order(p_level))
        .max()
        .unwrap_or(0)
}

/// Checks that a rule of the given strength is available on the shape and its sides, without
/// computing it.
pub fn check_quadrature_available(shape: ElementShape, strength: usize) -> Result<(), ConfigurationError> {
    // Collapsed simplex rules need more points in the collapsed directions
    let required_1d_strength = match shape {
        ElementShape::Triangle => strength + 1,
        ElementShape::Tetrahedron => strength + 2,
        _ => strength,
    };
    checked_gauss_points_for_strength(required_1d_strength)
        .map(|_| ())
        .map_err(|_| ConfigurationError::NoQuadratureRule { shape, strength })
}

fn pad<const N: usize>(points: Vec<[f64; N]>) -> Vec<[f64; 3]> {
    points
        .into_iter()
        .map(|p| {
            let mut x = [0.0; 3];
            x[..N].copy_from_slice(&p);
            x
        })
        .collect()
}

fn reference_rule(shape: ElementShape, strength: usize) -> Result<ReferenceRule, ConfigurationError> {
    let rule = match shape {
        ElementShape::Segment => univariate::gauss_with_strength(strength).map(|(w, p)| (w, pad(p))),
        ElementShape::Quadrilateral => tensor::quadrilateral_gauss_with_strength(strength).map(|(w, p)| (w, pad(p))),
        ElementShape::Hexahedron => tensor::hexahedron_gauss_with_strength(strength).map(|(w, p)| (w, pad(p))),
        ElementShape::Triangle => simplex::triangle_with_strength(strength).map(|(w, p)| (w, pad(p))),
        ElementShape::Tetrahedron => simplex::tetrahedron_with_strength(strength).map(|(w, p)| (w, pad(p))),
    };
    rule.map_err(|_| ConfigurationError::NoQuadratureRule { shape, strength })
}

fn convert_point<T, D>(x: &[f64; 3]) -> OPoint<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    OPoint::from(OVector::<T, D>::from_fn(|i, _| convert(x[i])))
}

/// A quadrature rule on one side of an element, expressed in element reference coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SideQuadrature<T, D>
where
    T: Scalar,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    weights: Vec<T>,
    points: Vec<OPoint<T, D>>,
    tangents: DMatrix<T>,
    reference_normal: OVector<T, D>,
}

impl<T, D> SideQuadrature<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn new(shape: ElementShape, side: usize, strength: usize) -> Result<Self, ConfigurationError> {
        let d = shape.reference_dim();
        let vertices = shape.reference_vertices();
        let side_vertices = shape.side_vertices(side);
        let normal = shape.reference_normal(side);
        let reference_normal = OVector::<T, D>::from_fn(|i, _| convert(normal[i]));

        let Some(side_shape) = shape.side_shape() else {
            // The sides of a segment are points
            return Ok(Self {
                weights: vec![T::one()],
                points: vec![convert_point(&vertices[side_vertices[0]])],
                tangents: DMatrix::zeros(d, 0),
                reference_normal,
            });
        };

        let (side_weights, side_points) = reference_rule(side_shape, strength)?;
        let side_basis = LagrangeBasis::vertex_basis(side_shape);
        let side_dim = side_shape.reference_dim();
        let mut phi = vec![0.0; side_basis.num_nodes()];
        let mut points = Vec::with_capacity(side_points.len());
        for s in &side_points {
            side_basis.populate_basis(&mut phi, &s[..side_dim]);
            let mut xi = [0.0; 3];
            for (&v, &phi_v) in side_vertices.iter().zip(&phi) {
                for k in 0..d {
                    xi[k] += phi_v * vertices[v][k];
                }
            }
            points.push(convert_point(&xi));
        }

        // The side maps are affine, so the tangents are constant
        let mut side_gradients = DMatrix::zeros(side_dim, side_basis.num_nodes());
        side_basis.populate_basis_gradients(DMatrixViewMut::from(&mut side_gradients), &side_points[0][..side_dim]);
        let mut tangents = DMatrix::<f64>::zeros(d, side_dim);
        for (&v, grad) in side_vertices.iter().zip(side_gradients.column_iter()) {
            for k in 0..d {
                for c in 0..side_dim {
                    tangents[(k, c)] += vertices[v][k] * grad[c];
                }
            }
        }

        Ok(Self {
            weights: side_weights.into_iter().map(convert).collect(),
            points,
            tangents: tangents.map(convert),
            reference_normal,
        })
    }

    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    pub fn points(&self) -> &[OPoint<T, D>] {
        &self.points
    }

    /// The `d x (d - 1)` derivative of the map from side reference coordinates to element
    /// reference coordinates.
    pub fn tangents(&self) -> &DMatrix<T> {
        &self.tangents
    }

    /// An outward normal of the side in reference coordinates, not necessarily of unit length.
    pub fn reference_normal(&self) -> &OVector<T, D> {
        &self.reference_normal
    }
}

/// Interior and side rules of a given strength for one reference shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementQuadrature<T, D>
where
    T: Scalar,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    shape: ElementShape,
    strength: usize,
    interior: QuadraturePair<T, D>,
    sides: Vec<SideQuadrature<T, D>>,
}

impl<T, D> ElementQuadrature<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Constructs the rules of the given strength for the shape.
    ///
    /// # Panics
    ///
    /// Panics if the dimension of the shape does not match `D`.
    pub fn new(shape: ElementShape, strength: usize) -> Result<Self, ConfigurationError> {
        assert_eq!(shape.reference_dim(), D::dim(), "Shape dimension must match dimension of rule");
        let (weights, points) = reference_rule(shape, strength)?;
        let interior = (
            weights.into_iter().map(convert).collect(),
            points.iter().map(convert_point).collect(),
        );
        let sides = (0..shape.num_sides())
            .map(|side| SideQuadrature::new(shape, side, strength))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            shape,
            strength,
            interior,
            sides,
        })
    }

    pub fn shape(&self) -> ElementShape {
        self.shape
    }

    pub fn strength(&self) -> usize {
        self.strength
    }

    pub fn interior_weights(&self) -> &[T] {
        &self.interior.0
    }

    pub fn interior_points(&self) -> &[OPoint<T, D>] {
        &self.interior.1
    }

    pub fn side(&self, side: usize) -> &SideQuadrature<T, D> {
        &self.sides[side]
    }
}

/// A cache of element rules keyed by shape and strength.
#[derive(Debug, Clone)]
pub struct QuadratureCache<T, D>
where
    T: Scalar,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    rules: FxHashMap<(ElementShape, usize), Arc<ElementQuadrature<T, D>>>,
}

impl<T, D> Default for QuadratureCache<T, D>
where
    T: Scalar,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    fn default() -> Self {
        Self {
            rules: FxHashMap::default(),
        }
    }
}

impl<T, D> QuadratureCache<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    /// Returns the rules for the shape and strength, computing them on first use.
    pub fn get_or_compute(
        &mut self,
        shape: ElementShape,
        strength: usize,
    ) -> Result<Arc<ElementQuadrature<T, D>>, ConfigurationError> {
        if let Some(rules) = self.rules.get(&(shape, strength)) {
            return Ok(Arc::clone(rules));
        }
        let rules = Arc::new(ElementQuadrature::new(shape, strength)?);
        self.rules.insert((shape, strength), Arc::clone(&rules));
        Ok(rules)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
