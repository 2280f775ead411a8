//! Collapsed Gauss rules for the reference triangle and tetrahedron.
//!
//! The unit simplex is obtained from the unit cube by the collapsing (Duffy) transformation
//!
//! ```text
//! x = u,  y = v (1 - u),  z = w (1 - u) (1 - v)
//! ```
//!
//! whose Jacobian determinant is `(1 - u)` in 2D and `(1 - u)^2 (1 - v)` in 3D. A polynomial of
//! total degree `p` on the simplex pulls back to a polynomial of degree at most `p + d - 1` in
//! `u`, so Gauss rules with an appropriate number of points in each direction integrate it
//! exactly. The rules are not the most economical ones available, but they exist for every
//! strength.

use crate::univariate::gauss_unit_interval;
use crate::{checked_gauss_points_for_strength, Error, Rule};

/// A collapsed Gauss rule on the reference triangle with `(n_u, n_v)` points in the two
/// collapsed directions.
pub fn triangle_collapsed_gauss(n_u: usize, n_v: usize) -> Rule<2> {
    let (wu, pu) = gauss_unit_interval(n_u);
    let (wv, pv) = gauss_unit_interval(n_v);
    let mut weights = Vec::with_capacity(n_u * n_v);
    let mut points = Vec::with_capacity(n_u * n_v);

    for (&w_u, &[u]) in wu.iter().zip(&pu) {
        for (&w_v, &[v]) in wv.iter().zip(&pv) {
            weights.push(w_u * w_v * (1.0 - u));
            points.push([u, v * (1.0 - u)]);
        }
    }

    (weights, points)
}

/// A collapsed Gauss rule on the reference tetrahedron with `(n_u, n_v, n_w)` points in the
/// three collapsed directions.
pub fn tetrahedron_collapsed_gauss(n_u: usize, n_v: usize, n_w: usize) -> Rule<3> {
    let (wu, pu) = gauss_unit_interval(n_u);
    let (wv, pv) = gauss_unit_interval(n_v);
    let (ww, pw) = gauss_unit_interval(n_w);
    let mut weights = Vec::with_capacity(n_u * n_v * n_w);
    let mut points = Vec::with_capacity(n_u * n_v * n_w);

    for (&w_u, &[u]) in wu.iter().zip(&pu) {
        for (&w_v, &[v]) in wv.iter().zip(&pv) {
            for (&w_w, &[w]) in ww.iter().zip(&pw) {
                let jacobian = (1.0 - u) * (1.0 - u) * (1.0 - v);
                weights.push(w_u * w_v * w_w * jacobian);
                points.push([u, v * (1.0 - u), w * (1.0 - u) * (1.0 - v)]);
            }
        }
    }

    (weights, points)
}

/// The collapsed rule on the reference triangle exact for total degree `strength`.
pub fn triangle_with_strength(strength: usize) -> Result<Rule<2>, Error> {
    let unavailable = |_| Error::NoRuleAvailable { strength };
    let n_u = checked_gauss_points_for_strength(strength + 1).map_err(unavailable)?;
    let n_v = checked_gauss_points_for_strength(strength).map_err(unavailable)?;
    Ok(triangle_collapsed_gauss(n_u, n_v))
}

/// The collapsed rule on the reference tetrahedron exact for total degree `strength`.
pub fn tetrahedron_with_strength(strength: usize) -> Result<Rule<3>, Error> {
    let unavailable = |_| Error::NoRuleAvailable { strength };
    let n_u = checked_gauss_points_for_strength(strength + 2).map_err(unavailable)?;
    let n_v = checked_gauss_points_for_strength(strength + 1).map_err(unavailable)?;
    let n_w = checked_gauss_points_for_strength(strength).map_err(unavailable)?;
    Ok(tetrahedron_collapsed_gauss(n_u, n_v, n_w))
}
