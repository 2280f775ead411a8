use crate::unit_tests::factorial;
use femsystem_quadrature::simplex::{tetrahedron_with_strength, triangle_with_strength};
use femsystem_quadrature::{Error, MAX_GAUSS_POINTS};
use matrixcompare::assert_scalar_eq;

#[test]
fn triangle_rules_are_exact_for_their_strength() {
    for strength in 0..=8 {
        let (weights, points) = triangle_with_strength(strength).unwrap();
        for a in 0..=strength {
            for b in 0..=(strength - a) {
                let integral: f64 = weights
                    .iter()
                    .zip(&points)
                    .map(|(w, [x, y])| w * x.powi(a as i32) * y.powi(b as i32))
                    .sum();
                // int_T x^a y^b = a! b! / (a + b + 2)!
                let expected = factorial(a) * factorial(b) / factorial(a + b + 2);
                assert_scalar_eq!(integral, expected, comp = abs, tol = 1e-13);
            }
        }
    }
}

#[test]
fn tetrahedron_rules_are_exact_for_their_strength() {
    for strength in 0..=6 {
        let (weights, points) = tetrahedron_with_strength(strength).unwrap();
        assert_scalar_eq!(weights.iter().sum::<f64>(), 1.0 / 6.0, comp = abs, tol = 1e-13);
        for a in 0..=strength {
            for b in 0..=(strength - a) {
                for c in 0..=(strength - a - b) {
                    let integral: f64 = weights
                        .iter()
                        .zip(&points)
                        .map(|(w, [x, y, z])| w * x.powi(a as i32) * y.powi(b as i32) * z.powi(c as i32))
                        .sum();
                    // int_K x^a y^b z^c = a! b! c! / (a + b + c + 3)!
                    let expected = factorial(a) * factorial(b) * factorial(c) / factorial(a + b + c + 3);
                    assert_scalar_eq!(integral, expected, comp = abs, tol = 1e-13);
                }
            }
        }
    }
}

#[test]
fn simplex_points_lie_inside_reference_domain() {
    let (_, points) = tetrahedron_with_strength(4).unwrap();
    for [x, y, z] in points {
        assert!(x >= 0.0 && y >= 0.0 && z >= 0.0);
        assert!(x + y + z <= 1.0);
    }
}

#[test]
fn collapsed_rules_report_unavailable_strength() {
    // The u-direction needs two orders more than the requested strength
    let strength = 2 * MAX_GAUSS_POINTS - 2;
    assert_eq!(
        tetrahedron_with_strength(strength),
        Err(Error::NoRuleAvailable { strength })
    );
    assert!(triangle_with_strength(strength).is_ok());
}
