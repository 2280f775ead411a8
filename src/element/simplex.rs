//! Lagrange bases of order 0, 1 and 2 on the reference triangle and tetrahedron, expressed in
//! barycentric coordinates.
use crate::element::ElementShape;
use crate::Real;
use nalgebra::{convert, DMatrixViewMut};

const TRIANGLE_EDGES: [[usize; 2]; 3] = [[0, 1], [1, 2], [2, 0]];
const TETRAHEDRON_EDGES: [[usize; 2]; 6] = [[0, 1], [1, 2], [2, 0], [0, 3], [1, 3], [2, 3]];

fn edges(shape: ElementShape) -> &'static [[usize; 2]] {
    match shape {
        ElementShape::Triangle => &TRIANGLE_EDGES,
        ElementShape::Tetrahedron => &TETRAHEDRON_EDGES,
        _ => unreachable!("not a simplex: {shape}"),
    }
}

pub(crate) fn num_nodes(shape: ElementShape, order: usize) -> usize {
    match order {
        0 => 1,
        1 => shape.num_vertices(),
        _ => shape.num_vertices() + edges(shape).len(),
    }
}

pub(crate) fn node_coordinates(shape: ElementShape, order: usize) -> Vec<[f64; 3]> {
    let vertices = shape.reference_vertices();
    match order {
        0 => vec![shape.reference_centroid()],
        1 => vertices.to_vec(),
        _ => {
            let midpoints = edges(shape).iter().map(|&[a, b]| {
                let mut x = [0.0; 3];
                for k in 0..3 {
                    x[k] = 0.5 * (vertices[a][k] + vertices[b][k]);
                }
                x
            });
            vertices.iter().copied().chain(midpoints).collect()
        }
    }
}

pub(crate) fn node_support(shape: ElementShape, order: usize, node: usize) -> Vec<usize> {
    let nv = shape.num_vertices();
    match order {
        0 => (0..nv).collect(),
        _ if node < nv => vec![node],
        _ => edges(shape)[node - nv].to_vec(),
    }
}

/// Barycentric coordinates `lambda_0 = 1 - sum(xi)` and `lambda_{k + 1} = xi_k`.
fn barycentric<T: Real>(xi: &[T]) -> Vec<T> {
    let sum = xi.iter().fold(T::zero(), |sum, &x| sum + x);
    std::iter::once(T::one() - sum).chain(xi.iter().copied()).collect()
}

/// Component `a` of the (constant) gradient of barycentric coordinate `j`.
fn barycentric_gradient<T: Real>(j: usize, a: usize) -> T {
    if j == 0 {
        -T::one()
    } else if a + 1 == j {
        T::one()
    } else {
        T::zero()
    }
}

pub(crate) fn populate_basis<T: Real>(shape: ElementShape, order: usize, values: &mut [T], xi: &[T]) {
    let lambda = barycentric(xi);
    let nv = shape.num_vertices();
    let four: T = convert(4.0);
    let two: T = convert(2.0);
    match order {
        0 => values[0] = T::one(),
        1 => values.copy_from_slice(&lambda),
        _ => {
            for v in 0..nv {
                values[v] = lambda[v] * (two * lambda[v] - T::one());
            }
            for (e, &[a, b]) in edges(shape).iter().enumerate() {
                values[nv + e] = four * lambda[a] * lambda[b];
            }
        }
    }
}

pub(crate) fn populate_basis_gradients<T: Real>(
    shape: ElementShape,
    order: usize,
    gradients: &mut DMatrixViewMut<T>,
    xi: &[T],
) {
    let lambda = barycentric(xi);
    let nv = shape.num_vertices();
    let d = shape.reference_dim();
    let four: T = convert(4.0);
    let grad = barycentric_gradient::<T>;
    match order {
        0 => gradients.fill(T::zero()),
        1 => {
            for v in 0..nv {
                for a in 0..d {
                    gradients[(a, v)] = grad(v, a);
                }
            }
        }
        _ => {
            for v in 0..nv {
                for a in 0..d {
                    gradients[(a, v)] = (four * lambda[v] - T::one()) * grad(v, a);
                }
            }
            for (e, &[i, j]) in edges(shape).iter().enumerate() {
                for a in 0..d {
                    gradients[(a, nv + e)] = four * (lambda[i] * grad(j, a) + lambda[j] * grad(i, a));
                }
            }
        }
    }
}

pub(crate) fn populate_basis_hessians<T: Real>(
    shape: ElementShape,
    order: usize,
    hessians: &mut DMatrixViewMut<T>,
    _xi: &[T],
) {
    hessians.fill(T::zero());
    if order < 2 {
        return;
    }

    let nv = shape.num_vertices();
    let d = shape.reference_dim();
    let four: T = convert(4.0);
    let grad = barycentric_gradient::<T>;
    for a in 0..d {
        for b in 0..d {
            let row = a + d * b;
            for v in 0..nv {
                hessians[(row, v)] = four * grad(v, a) * grad(v, b);
            }
            for (e, &[i, j]) in edges(shape).iter().enumerate() {
                hessians[(row, nv + e)] = four * (grad(i, a) * grad(j, b) + grad(j, a) * grad(i, b));
            }
        }
    }
}
