//! Basic procedural mesh generation routines.
//!
//! All generated elements are positively oriented with respect to their reference shapes.
use crate::element::ElementShape;
use crate::mesh::{Mesh, Mesh1d, Mesh2d, Mesh3d};
use crate::Real;
use nalgebra::{convert, Point1, Point2, Point3};

fn coordinate<T: Real>(i: usize, cells: usize) -> T {
    convert(i as f64 / cells as f64)
}

/// Uniform mesh of `[0, 1]` with the given number of segments.
pub fn create_unit_interval_uniform_mesh_1d<T: Real>(cells: usize) -> Mesh1d<T> {
    if cells == 0 {
        return Mesh::from_vertices_and_elements(Vec::new(), Vec::new());
    }
    let vertices = (0..=cells)
        .map(|i| Point1::new(coordinate(i, cells)))
        .collect();
    let elements = (0..cells)
        .map(|i| (ElementShape::Segment, vec![i, i + 1]))
        .collect();
    Mesh::from_vertices_and_elements(vertices, elements)
}

fn unit_square_vertices<T: Real>(cells_per_dim: usize) -> Vec<Point2<T>> {
    let n = cells_per_dim;
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    for j in 0..=n {
        for i in 0..=n {
            vertices.push(Point2::new(coordinate(i, n), coordinate(j, n)));
        }
    }
    vertices
}

/// Uniform quadrilateral mesh of `[0, 1]^2`.
pub fn create_unit_square_uniform_quad_mesh_2d<T: Real>(cells_per_dim: usize) -> Mesh2d<T> {
    if cells_per_dim == 0 {
        return Mesh::from_vertices_and_elements(Vec::new(), Vec::new());
    }
    let n = cells_per_dim;
    let idx = |i: usize, j: usize| (n + 1) * j + i;
    let mut elements = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            let quad = vec![idx(i, j), idx(i + 1, j), idx(i + 1, j + 1), idx(i, j + 1)];
            elements.push((ElementShape::Quadrilateral, quad));
        }
    }
    Mesh::from_vertices_and_elements(unit_square_vertices(n), elements)
}

/// Uniform triangle mesh of `[0, 1]^2`, splitting every square cell along the same diagonal.
pub fn create_unit_square_uniform_tri_mesh_2d<T: Real>(cells_per_dim: usize) -> Mesh2d<T> {
    if cells_per_dim == 0 {
        return Mesh::from_vertices_and_elements(Vec::new(), Vec::new());
    }
    let n = cells_per_dim;
    let idx = |i: usize, j: usize| (n + 1) * j + i;
    let mut elements = Vec::with_capacity(2 * n * n);
    for j in 0..n {
        for i in 0..n {
            elements.push((ElementShape::Triangle, vec![idx(i, j), idx(i + 1, j), idx(i + 1, j + 1)]));
            elements.push((ElementShape::Triangle, vec![idx(i, j), idx(i + 1, j + 1), idx(i, j + 1)]));
        }
    }
    Mesh::from_vertices_and_elements(unit_square_vertices(n), elements)
}

fn unit_box_vertices<T: Real>(cells_per_dim: usize) -> Vec<Point3<T>> {
    let n = cells_per_dim;
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1) * (n + 1));
    for k in 0..=n {
        for j in 0..=n {
            for i in 0..=n {
                vertices.push(Point3::new(coordinate(i, n), coordinate(j, n), coordinate(k, n)));
            }
        }
    }
    vertices
}

/// Uniform hexahedral mesh of `[0, 1]^3`.
pub fn create_unit_box_uniform_hex_mesh_3d<T: Real>(cells_per_dim: usize) -> Mesh3d<T> {
    if cells_per_dim == 0 {
        return Mesh::from_vertices_and_elements(Vec::new(), Vec::new());
    }
    let n = cells_per_dim;
    let idx = |i: usize, j: usize, k: usize| (n + 1) * (n + 1) * k + (n + 1) * j + i;
    let mut elements = Vec::with_capacity(n * n * n);
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                let hex = vec![
                    idx(i, j, k),
                    idx(i + 1, j, k),
                    idx(i + 1, j + 1, k),
                    idx(i, j + 1, k),
                    idx(i, j, k + 1),
                    idx(i + 1, j, k + 1),
                    idx(i + 1, j + 1, k + 1),
                    idx(i, j + 1, k + 1),
                ];
                elements.push((ElementShape::Hexahedron, hex));
            }
        }
    }
    Mesh::from_vertices_and_elements(unit_box_vertices(n), elements)
}

/// Uniform tetrahedral mesh of `[0, 1]^3`, splitting every cube into six tetrahedra around its
/// main diagonal (Kuhn subdivision), which gives a conforming mesh.
pub fn create_unit_box_uniform_tet_mesh_3d<T: Real>(cells_per_dim: usize) -> Mesh3d<T> {
    if cells_per_dim == 0 {
        return Mesh::from_vertices_and_elements(Vec::new(), Vec::new());
    }
    // Axis permutations and whether they are even
    const PERMUTATIONS: [([usize; 3], bool); 6] = [
        ([0, 1, 2], true),
        ([1, 2, 0], true),
        ([2, 0, 1], true),
        ([0, 2, 1], false),
        ([2, 1, 0], false),
        ([1, 0, 2], false),
    ];

    let n = cells_per_dim;
    let idx = |c: [usize; 3]| (n + 1) * (n + 1) * c[2] + (n + 1) * c[1] + c[0];
    let mut elements = Vec::with_capacity(6 * n * n * n);
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                for (axes, even) in PERMUTATIONS {
                    // Walk from the lowest to the highest corner of the cube, one axis at a time
                    let mut corner = [i, j, k];
                    let mut path = vec![idx(corner)];
                    for axis in axes {
                        corner[axis] += 1;
                        path.push(idx(corner));
                    }
                    if !even {
                        path.swap(1, 2);
                    }
                    elements.push((ElementShape::Tetrahedron, path));
                }
            }
        }
    }
    Mesh::from_vertices_and_elements(unit_box_vertices(n), elements)
}
