//! Quadrature rules on `[-1, 1]^d` formed by tensor products of 1D Gauss rules.

use crate::univariate::gauss;
use crate::{checked_gauss_points_for_strength, Error, Rule};

/// The tensor product of the 1D Gauss rule with `num_points_per_dim` points with itself.
///
/// Points are ordered lexicographically, with the last coordinate varying fastest.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn tensor_gauss<const D: usize>(num_points_per_dim: usize) -> Rule<D> {
    let n = num_points_per_dim;
    let (weights1d, points1d) = gauss(n);
    let num_points = n.pow(D as u32);
    let mut weights = Vec::with_capacity(num_points);
    let mut points = Vec::with_capacity(num_points);

    for index in 0..num_points {
        let mut point = [0.0; D];
        let mut weight = 1.0;
        let mut remainder = index;
        for k in (0..D).rev() {
            let i = remainder % n;
            remainder /= n;
            point[k] = points1d[i][0];
            weight *= weights1d[i];
        }
        weights.push(weight);
        points.push(point);
    }

    (weights, points)
}

/// A Gauss quadrature rule for the reference quadrilateral `[-1, 1]^2`.
pub fn quadrilateral_gauss(num_points_per_dim: usize) -> Rule<2> {
    tensor_gauss(num_points_per_dim)
}

/// A Gauss quadrature rule for the reference hexahedron `[-1, 1]^3`.
pub fn hexahedron_gauss(num_points_per_dim: usize) -> Rule<3> {
    tensor_gauss(num_points_per_dim)
}

/// The tensor Gauss rule on the reference quadrilateral exact for total degree `strength`.
pub fn quadrilateral_gauss_with_strength(strength: usize) -> Result<Rule<2>, Error> {
    checked_gauss_points_for_strength(strength).map(quadrilateral_gauss)
}

/// The tensor Gauss rule on the reference hexahedron exact for total degree `strength`.
pub fn hexahedron_gauss_with_strength(strength: usize) -> Result<Rule<3>, Error> {
    checked_gauss_points_for_strength(strength).map(hexahedron_gauss)
}
