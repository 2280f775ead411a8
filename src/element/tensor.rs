//! Tensor-product Lagrange bases on `[-1, 1]^d`, built from equispaced 1D Lagrange polynomials.
use crate::element::ElementShape;
use crate::Real;
use nalgebra::{convert, DMatrixViewMut};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TensorNodes {
    shape: ElementShape,
    order: usize,
    // One 1D node index per reference direction, unused directions are zero
    multi_indices: Vec<[usize; 3]>,
}

fn coordinate_1d(order: usize, i: usize) -> f64 {
    if order == 0 {
        0.0
    } else {
        -1.0 + 2.0 * i as f64 / order as f64
    }
}

/// Values and first and second derivatives of all 1D Lagrange polynomials of a given order.
struct Lagrange1d<T> {
    values: Vec<T>,
    first: Vec<T>,
    second: Vec<T>,
}

impl<T: Real> Lagrange1d<T> {
    fn evaluate(order: usize, x: T) -> Self {
        let nodes: Vec<T> = (0..=order).map(|i| convert(coordinate_1d(order, i))).collect();
        // prod_{m not in skip} (x - x_m)
        let product = |skip: &[usize]| {
            nodes
                .iter()
                .enumerate()
                .filter(|(m, _)| !skip.contains(m))
                .fold(T::one(), |acc, (_, &x_m)| acc * (x - x_m))
        };

        let mut values = Vec::with_capacity(order + 1);
        let mut first = Vec::with_capacity(order + 1);
        let mut second = Vec::with_capacity(order + 1);
        for i in 0..=order {
            let denominator = nodes
                .iter()
                .enumerate()
                .filter(|(m, _)| *m != i)
                .fold(T::one(), |acc, (_, &x_m)| acc * (nodes[i] - x_m));

            let mut d1 = T::zero();
            let mut d2 = T::zero();
            for j in (0..=order).filter(|&j| j != i) {
                d1 += product(&[i, j]);
                for k in (0..=order).filter(|&k| k != i && k != j) {
                    d2 += product(&[i, j, k]);
                }
            }

            values.push(product(&[i]) / denominator);
            first.push(d1 / denominator);
            second.push(d2 / denominator);
        }

        Self { values, first, second }
    }

    fn derivative(&self, node: usize, num_derivatives: usize) -> T {
        match num_derivatives {
            0 => self.values[node],
            1 => self.first[node],
            _ => self.second[node],
        }
    }
}

impl TensorNodes {
    pub fn new(shape: ElementShape, order: usize) -> Self {
        let dim = shape.reference_dim();
        if order == 0 {
            return Self {
                shape,
                order,
                multi_indices: vec![[0; 3]],
            };
        }

        let mut multi_indices: Vec<[usize; 3]> = shape
            .reference_vertices()
            .iter()
            .map(|v| {
                let mut idx = [0; 3];
                for k in 0..dim {
                    idx[k] = if v[k] < 0.0 { 0 } else { order };
                }
                idx
            })
            .collect();

        let extent = |k: usize| if k < dim { order + 1 } else { 1 };
        for c in 0..extent(2) {
            for b in 0..extent(1) {
                for a in 0..extent(0) {
                    let idx = [a, b, c];
                    if !multi_indices.contains(&idx) {
                        multi_indices.push(idx);
                    }
                }
            }
        }

        Self {
            shape,
            order,
            multi_indices,
        }
    }

    pub fn len(&self) -> usize {
        self.multi_indices.len()
    }

    fn dim(&self) -> usize {
        self.shape.reference_dim()
    }

    pub fn coordinates(&self) -> Vec<[f64; 3]> {
        self.multi_indices
            .iter()
            .map(|idx| {
                let mut x = [0.0; 3];
                for k in 0..self.dim() {
                    x[k] = coordinate_1d(self.order, idx[k]);
                }
                x
            })
            .collect()
    }

    pub fn support(&self, node: usize) -> Vec<usize> {
        let idx = self.multi_indices[node];
        let dim = self.dim();
        let order = self.order;
        self.shape
            .reference_vertices()
            .iter()
            .enumerate()
            .filter(|(_, v)| {
                (0..dim).all(|k| {
                    if order > 0 && idx[k] == 0 {
                        v[k] < 0.0
                    } else if order > 0 && idx[k] == order {
                        v[k] > 0.0
                    } else {
                        true
                    }
                })
            })
            .map(|(i, _)| i)
            .collect()
    }

    fn tables<T: Real>(&self, xi: &[T]) -> Vec<Lagrange1d<T>> {
        assert_eq!(xi.len(), self.dim(), "Reference coordinates must match the reference dimension");
        xi.iter().map(|&x| Lagrange1d::evaluate(self.order, x)).collect()
    }

    pub fn populate_basis<T: Real>(&self, values: &mut [T], xi: &[T]) {
        let tables = self.tables(xi);
        for (value, idx) in values.iter_mut().zip(&self.multi_indices) {
            *value = tables
                .iter()
                .enumerate()
                .fold(T::one(), |acc, (k, table)| acc * table.values[idx[k]]);
        }
    }

    pub fn populate_basis_gradients<T: Real>(&self, gradients: &mut DMatrixViewMut<T>, xi: &[T]) {
        let tables = self.tables(xi);
        for (n, idx) in self.multi_indices.iter().enumerate() {
            for a in 0..self.dim() {
                gradients[(a, n)] = tables
                    .iter()
                    .enumerate()
                    .fold(T::one(), |acc, (k, table)| acc * table.derivative(idx[k], (k == a) as usize));
            }
        }
    }

    pub fn populate_basis_hessians<T: Real>(&self, hessians: &mut DMatrixViewMut<T>, xi: &[T]) {
        let tables = self.tables(xi);
        let d = self.dim();
        for (n, idx) in self.multi_indices.iter().enumerate() {
            for a in 0..d {
                for b in 0..d {
                    hessians[(a + d * b, n)] = tables.iter().enumerate().fold(T::one(), |acc, (k, table)| {
                        let num_derivatives = (k == a) as usize + (k == b) as usize;
                        acc * table.derivative(idx[k], num_derivatives)
                    });
                }
            }
        }
    }
}
