//! Quadrature rules for one-dimensional domains.

use crate::{checked_gauss_points_for_strength, Error, Rule};
use std::f64::consts::PI;

/// Maximum number of Newton iterations used to refine a single Legendre root.
const MAX_NEWTON_ITERATIONS: usize = 100;

/// Recurrence relation for Legendre polynomials.
///
/// Note: the derivative formula is *not* defined at |x| == 1, so it is only
/// suitable for evaluation in the open interval (-1, 1).
#[derive(Debug, Default)]
struct LegendreRecurrence {
    n: usize,
    x: f64,
    // p_n(x)
    p1: f64,
    // p_{n - 1}(x)
    p2: f64,
}

impl LegendreRecurrence {
    fn evaluate(n: usize, x: f64) -> Self {
        //  m P_m(x) = (2m - 1) * x P_{m - 1}(x) - (m - 1) P_{m - 2}(x)
        let mut p1 = 1.0;
        let mut p2 = 0.0;
        for m in 1..=n {
            let m = m as f64;
            let p3 = p2;
            p2 = p1;
            p1 = ((2.0 * m - 1.0) * x * p2 - (m - 1.0) * p3) / m;
        }

        Self { n, x, p1, p2 }
    }

    fn value(&self) -> f64 {
        self.p1
    }

    fn derivative(&self) -> f64 {
        let Self { n, x, p1, p2 } = self;
        let n = *n as f64;
        // dp_n/dx (x) = n * (x * p_n(x) - p_{n - 1}(x)) / (x^2 - 1)
        n * (x * p1 - p2) / (x * x - 1.0)
    }
}

/// Gauss quadrature for the reference interval `[-1, 1]`.
///
/// Returns the [Gauss quadrature rule] with the given number of points. Given `n` points,
/// the rule integrates polynomials of degree up to `2 n - 1` exactly. Points are returned in
/// increasing order.
///
/// # Panics
///
/// Panics if zero points are requested.
///
/// [Gauss quadrature rule]: https://en.wikipedia.org/wiki/Gaussian_quadrature
pub fn gauss(num_points: usize) -> Rule<1> {
    let n = num_points;
    assert!(n > 0, "number of points must be positive");

    let m = (n + 1) / 2;
    let mut points = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);

    // Roots are symmetric about the origin, so we only find the non-positive half
    for i in 0..m {
        let mut x = -(PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let recurrence = LegendreRecurrence::evaluate(n, x);
            let dx = -recurrence.value() / recurrence.derivative();
            x += dx;
            if dx.abs() <= 1e-15 {
                break;
            }
        }

        let dp = LegendreRecurrence::evaluate(n, x).derivative();
        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        points.push([x]);
        weights.push(w);
    }

    // An odd rule has its middle root at exactly zero
    if n % 2 == 1 {
        points[m - 1] = [0.0];
    }

    for i in m..n {
        let mirror_idx = n - i - 1;
        points.push([-points[mirror_idx][0]]);
        weights.push(weights[mirror_idx]);
    }

    debug_assert_eq!(points.len(), n);
    (weights, points)
}

/// Gauss quadrature on the unit interval `[0, 1]`.
///
/// Same as [`gauss`], mapped affinely onto `[0, 1]`.
pub fn gauss_unit_interval(num_points: usize) -> Rule<1> {
    let (weights, points) = gauss(num_points);
    let weights = weights.into_iter().map(|w| 0.5 * w).collect();
    let points = points.into_iter().map(|[x]| [0.5 * (x + 1.0)]).collect();
    (weights, points)
}

/// The Gauss rule on `[-1, 1]` with the fewest points that is exact for polynomials of degree
/// `strength`.
pub fn gauss_with_strength(strength: usize) -> Result<Rule<1>, Error> {
    checked_gauss_points_for_strength(strength).map(gauss)
}
