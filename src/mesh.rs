//! The mesh abstraction consumed by assembly, and a simple index-based reference mesh.
use crate::allocators::DimAllocator;
use crate::element::{ElementGeometry, ElementShape};
use crate::{Real, SmallDim};
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, OPoint, Scalar, U1, U2, U3};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub mod procedural;

/// Topology and geometry of a mesh, as seen by assembly.
///
/// Elements are identified by their index in `0 .. num_elements()`.
pub trait FemMesh<T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    fn vertices(&self) -> &[OPoint<T, D>];

    fn num_elements(&self) -> usize;

    fn element_shape(&self, element: usize) -> ElementShape;

    fn element_vertex_indices(&self, element: usize) -> &[usize];

    /// The element sharing the given side, or `None` if the side lies on the domain boundary.
    fn element_neighbor(&self, element: usize, side: usize) -> Option<usize>;

    /// The p-refinement level of the element.
    fn element_p_level(&self, _element: usize) -> usize {
        0
    }

    /// Whether the element is active and owned by this process.
    fn is_active_local(&self, _element: usize) -> bool {
        true
    }
}

/// The geometry of an element of a mesh.
pub fn element_geometry<T, D>(mesh: &(impl FemMesh<T, D> + ?Sized), element: usize) -> ElementGeometry<T, D>
where
    T: Real,
    D: SmallDim,
    DefaultAllocator: DimAllocator<T, D>,
{
    let vertices = mesh
        .element_vertex_indices(element)
        .iter()
        .map(|&v| mesh.vertices()[v].clone())
        .collect();
    ElementGeometry::new(mesh.element_shape(element), vertices)
}

/// An index-based conforming mesh with elements of arbitrary shape.
///
/// Neighbor relations are computed on construction by matching the vertex sets of sides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct Mesh<T: Scalar, D>
where
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    // serde's not able correctly determine the necessary trait bounds in this case,
    // so write our own
    #[serde(bound(
        serialize = "<DefaultAllocator as Allocator<T, D>>::Buffer: Serialize",
        deserialize = "<DefaultAllocator as Allocator<T, D>>::Buffer: Deserialize<'de>"
    ))]
    vertices: Vec<OPoint<T, D>>,
    shapes: Vec<ElementShape>,
    connectivity: Vec<Vec<usize>>,
    neighbors: Vec<Vec<Option<usize>>>,
    p_levels: Option<Vec<usize>>,
    active_local: Option<Vec<bool>>,
}

pub type Mesh1d<T> = Mesh<T, U1>;
pub type Mesh2d<T> = Mesh<T, U2>;
pub type Mesh3d<T> = Mesh<T, U3>;

fn compute_neighbors(shapes: &[ElementShape], connectivity: &[Vec<usize>]) -> Vec<Vec<Option<usize>>> {
    let mut neighbors: Vec<Vec<Option<usize>>> = shapes.iter().map(|shape| vec![None; shape.num_sides()]).collect();
    let mut unmatched_sides = FxHashMap::default();
    for (element, (shape, vertices)) in shapes.iter().zip(connectivity).enumerate() {
        for side in 0..shape.num_sides() {
            let mut key: Vec<usize> = shape
                .side_vertices(side)
                .iter()
                .map(|&v| vertices[v])
                .collect();
            key.sort_unstable();
            if let Some((other, other_side)) = unmatched_sides.remove(&key) {
                neighbors[element][side] = Some(other);
                neighbors[other][other_side] = Some(element);
            } else {
                unmatched_sides.insert(key, (element, side));
            }
        }
    }
    neighbors
}

fn pick_elements<V: Clone>(values: &Option<Vec<V>>, elements: &[usize]) -> Option<Vec<V>> {
    values
        .as_ref()
        .map(|values| elements.iter().map(|&e| values[e].clone()).collect())
}

impl<T, D> Mesh<T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    /// Construct a mesh from vertices and elements, given as a shape and its vertex indices.
    ///
    /// # Panics
    ///
    /// Panics if an element has the wrong number of vertices or dimension for its shape, or if
    /// a vertex index is out of bounds.
    pub fn from_vertices_and_elements(
        vertices: Vec<OPoint<T, D>>,
        elements: Vec<(ElementShape, Vec<usize>)>,
    ) -> Self {
        let (shapes, connectivity): (Vec<_>, Vec<_>) = elements.into_iter().unzip();
        for (shape, element_vertices) in shapes.iter().zip(&connectivity) {
            assert_eq!(shape.reference_dim(), D::dim(), "Element dimension must match mesh dimension");
            assert_eq!(element_vertices.len(), shape.num_vertices(), "Vertex count must match shape");
            assert!(
                element_vertices.iter().all(|&v| v < vertices.len()),
                "Vertex indices must be in bounds"
            );
        }
        let neighbors = compute_neighbors(&shapes, &connectivity);
        Self {
            vertices,
            shapes,
            connectivity,
            neighbors,
            p_levels: None,
            active_local: None,
        }
    }

    /// Assigns a p-refinement level to each element.
    ///
    /// # Panics
    ///
    /// Panics if there is not exactly one level per element.
    pub fn with_p_levels(mut self, p_levels: Vec<usize>) -> Self {
        assert_eq!(p_levels.len(), self.shapes.len(), "Need one p-level per element");
        self.p_levels = Some(p_levels);
        self
    }

    /// Marks which elements are active and local. Inactive elements are skipped by assembly.
    ///
    /// # Panics
    ///
    /// Panics if there is not exactly one entry per element.
    pub fn with_active_local_elements(mut self, active_local: Vec<bool>) -> Self {
        assert_eq!(active_local.len(), self.shapes.len(), "Need one entry per element");
        self.active_local = Some(active_local);
        self
    }

    /// Restricts the mesh to the given elements, in the given order.
    ///
    /// Vertices are kept as is. Neighbor relations are recomputed for the new element set.
    pub fn keep_elements(&self, elements: &[usize]) -> Self {
        let shapes: Vec<_> = elements.iter().map(|&e| self.shapes[e]).collect();
        let connectivity: Vec<_> = elements.iter().map(|&e| self.connectivity[e].clone()).collect();
        Self {
            vertices: self.vertices.clone(),
            neighbors: compute_neighbors(&shapes, &connectivity),
            shapes,
            connectivity,
            p_levels: pick_elements(&self.p_levels, elements),
            active_local: pick_elements(&self.active_local, elements),
        }
    }
}

impl<T, D> FemMesh<T, D> for Mesh<T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    fn vertices(&self) -> &[OPoint<T, D>] {
        &self.vertices
    }

    fn num_elements(&self) -> usize {
        self.shapes.len()
    }

    fn element_shape(&self, element: usize) -> ElementShape {
        self.shapes[element]
    }

    fn element_vertex_indices(&self, element: usize) -> &[usize] {
        &self.connectivity[element]
    }

    fn element_neighbor(&self, element: usize, side: usize) -> Option<usize> {
        self.neighbors[element][side]
    }

    fn element_p_level(&self, element: usize) -> usize {
        self.p_levels.as_ref().map(|levels| levels[element]).unwrap_or(0)
    }

    fn is_active_local(&self, element: usize) -> bool {
        self.active_local
            .as_ref()
            .map(|active| active[element])
            .unwrap_or(true)
    }
}
