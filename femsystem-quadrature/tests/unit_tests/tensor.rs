use femsystem_quadrature::tensor::{
    hexahedron_gauss, hexahedron_gauss_with_strength, quadrilateral_gauss, quadrilateral_gauss_with_strength,
    tensor_gauss,
};
use femsystem_quadrature::univariate::gauss;
use matrixcompare::assert_scalar_eq;

fn monomial_integral_1d(k: i32) -> f64 {
    if k % 2 == 1 {
        0.0
    } else {
        2.0 / (k as f64 + 1.0)
    }
}

#[test]
fn quadrilateral_gauss_integrates_tensor_monomials() {
    let (weights, points) = quadrilateral_gauss(3);
    assert_eq!(weights.len(), 9);
    for a in 0..=5 {
        for b in 0..=5 {
            let integral: f64 = weights
                .iter()
                .zip(&points)
                .map(|(w, [x, y])| w * x.powi(a) * y.powi(b))
                .sum();
            let expected = monomial_integral_1d(a) * monomial_integral_1d(b);
            assert_scalar_eq!(integral, expected, comp = abs, tol = 1e-13);
        }
    }
}

#[test]
fn hexahedron_gauss_integrates_tensor_monomials() {
    let (weights, points) = hexahedron_gauss(2);
    assert_eq!(weights.len(), 8);
    assert_scalar_eq!(weights.iter().sum::<f64>(), 8.0, comp = abs, tol = 1e-13);
    for a in 0..=3 {
        for b in 0..=3 {
            for c in 0..=3 {
                let integral: f64 = weights
                    .iter()
                    .zip(&points)
                    .map(|(w, [x, y, z])| w * x.powi(a) * y.powi(b) * z.powi(c))
                    .sum();
                let expected = monomial_integral_1d(a) * monomial_integral_1d(b) * monomial_integral_1d(c);
                assert_scalar_eq!(integral, expected, comp = abs, tol = 1e-13);
            }
        }
    }
}

#[test]
fn strength_selection_uses_fewest_points() {
    assert_eq!(quadrilateral_gauss_with_strength(0).unwrap().0.len(), 1);
    assert_eq!(quadrilateral_gauss_with_strength(3).unwrap().0.len(), 4);
    assert_eq!(quadrilateral_gauss_with_strength(4).unwrap().0.len(), 9);
    assert_eq!(hexahedron_gauss_with_strength(5).unwrap().0.len(), 27);
}

#[test]
fn tensor_points_are_ordered_lexicographically() {
    let (weights1d, points1d) = gauss(2);
    let (weights, points) = quadrilateral_gauss(2);
    assert_eq!(points[1], [points1d[0][0], points1d[1][0]]);
    assert_eq!(points[2], [points1d[1][0], points1d[0][0]]);
    assert_scalar_eq!(weights[1], weights1d[0] * weights1d[1]);

    // The one-dimensional product is the Gauss rule itself
    assert_eq!(tensor_gauss::<1>(4), gauss(4));
}
