use femsystem::element::{ElementGeometry, ElementShape, FeType, LagrangeBasis, MAX_TENSOR_ORDER};
use femsystem::error::ConfigurationError;
use femsystem::nalgebra::{DMatrix, DMatrixViewMut, Matrix3, Point2, Point3, Vector3};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use proptest::collection::vec;
use proptest::prelude::*;

const ALL_SHAPES: [ElementShape; 5] = [
    ElementShape::Segment,
    ElementShape::Triangle,
    ElementShape::Quadrilateral,
    ElementShape::Tetrahedron,
    ElementShape::Hexahedron,
];

fn all_bases() -> Vec<LagrangeBasis> {
    let mut bases = Vec::new();
    for shape in ALL_SHAPES {
        let max_order = if shape.is_simplex() { 2 } else { 4 };
        for order in 0..=max_order {
            bases.push(LagrangeBasis::new(shape, order).unwrap());
        }
    }
    bases
}

/// Maps coordinates in `[0, 1]` to a point inside the reference shape.
fn reference_point(shape: ElementShape, unit_coords: &[f64]) -> Vec<f64> {
    let d = shape.reference_dim();
    if shape.is_simplex() {
        unit_coords[..d].iter().map(|c| c / d as f64).collect()
    } else {
        unit_coords[..d].iter().map(|c| 2.0 * c - 1.0).collect()
    }
}

fn basis_values(basis: &LagrangeBasis, xi: &[f64]) -> Vec<f64> {
    let mut values = vec![0.0; basis.num_nodes()];
    basis.populate_basis(&mut values, xi);
    values
}

fn basis_gradients(basis: &LagrangeBasis, xi: &[f64]) -> DMatrix<f64> {
    let mut gradients = DMatrix::zeros(basis.reference_dim(), basis.num_nodes());
    basis.populate_basis_gradients(DMatrixViewMut::from(&mut gradients), xi);
    gradients
}

fn basis_hessians(basis: &LagrangeBasis, xi: &[f64]) -> DMatrix<f64> {
    let d = basis.reference_dim();
    let mut hessians = DMatrix::zeros(d * d, basis.num_nodes());
    basis.populate_basis_hessians(DMatrixViewMut::from(&mut hessians), xi);
    hessians
}

#[test]
fn basis_node_counts() {
    let count = |shape, order| LagrangeBasis::new(shape, order).unwrap().num_nodes();
    assert_eq!(count(ElementShape::Segment, 3), 4);
    assert_eq!(count(ElementShape::Triangle, 1), 3);
    assert_eq!(count(ElementShape::Triangle, 2), 6);
    assert_eq!(count(ElementShape::Quadrilateral, 0), 1);
    assert_eq!(count(ElementShape::Quadrilateral, 2), 9);
    assert_eq!(count(ElementShape::Tetrahedron, 2), 10);
    assert_eq!(count(ElementShape::Hexahedron, 2), 27);
    assert_eq!(count(ElementShape::Hexahedron, 3), 64);
    assert!(LagrangeBasis::new(ElementShape::Triangle, 3).is_none());
    assert!(LagrangeBasis::new(ElementShape::Quadrilateral, MAX_TENSOR_ORDER + 1).is_none());
}

#[test]
fn basis_functions_are_nodal() {
    for basis in all_bases() {
        let nodes = basis.node_coordinates();
        assert_eq!(nodes.len(), basis.num_nodes());
        for (j, node) in nodes.iter().enumerate() {
            let values = basis_values(&basis, &node[..basis.reference_dim()]);
            for (i, value) in values.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_scalar_eq!(*value, expected, comp = abs, tol = 1e-12);
            }
        }
    }
}

#[test]
fn first_order_basis_nodes_are_reference_vertices() {
    for shape in ALL_SHAPES {
        let basis = LagrangeBasis::new(shape, 1).unwrap();
        assert_eq!(basis, LagrangeBasis::vertex_basis(shape));
        assert_eq!(basis.node_coordinates(), shape.reference_vertices().to_vec());
        for node in 0..basis.num_nodes() {
            assert_eq!(basis.node_support(node), vec![node]);
        }
    }
}

#[test]
fn quadratic_node_support_identifies_edges() {
    let basis = LagrangeBasis::new(ElementShape::Quadrilateral, 2).unwrap();
    let mut supports: Vec<_> = (0..basis.num_nodes())
        .map(|node| {
            let mut support = basis.node_support(node);
            support.sort();
            support
        })
        .collect();
    supports.sort();
    let expected = vec![
        vec![0],
        vec![0, 1],
        vec![0, 1, 2, 3],
        vec![0, 3],
        vec![1],
        vec![1, 2],
        vec![2],
        vec![2, 3],
        vec![3],
    ];
    assert_eq!(supports, expected);
}

#[test]
fn fe_type_support() {
    use ElementShape::*;
    assert!(FeType::lagrange(1).check_supported(Tetrahedron, 0).is_ok());
    assert!(FeType::lagrange(2).check_supported(Hexahedron, 0).is_ok());
    assert!(FeType::discontinuous_lagrange(0).check_supported(Triangle, 0).is_ok());
    assert!(FeType::discontinuous_lagrange(2).check_supported(Quadrilateral, 3).is_ok());

    assert_eq!(
        FeType::lagrange(3).check_supported(Triangle, 0),
        Err(ConfigurationError::UnsupportedFiniteElement {
            fe_type: FeType::lagrange(3),
            shape: Triangle,
            p_level: 0
        })
    );
    assert!(FeType::lagrange(0).check_supported(Segment, 0).is_err());
    assert!(FeType::lagrange(1).check_supported(Quadrilateral, 1).is_err());
    assert!(FeType::discontinuous_lagrange(2).check_supported(Tetrahedron, 1).is_err());
    assert!(FeType::discontinuous_lagrange(MAX_TENSOR_ORDER)
        .check_supported(Hexahedron, 1)
        .is_err());

    let basis = FeType::discontinuous_lagrange(1)
        .reference_basis(Quadrilateral, 2)
        .unwrap();
    assert_eq!(basis.order(), 3);
    assert_eq!(basis.num_nodes(), 16);
}

#[test]
fn reference_sides_and_normals_are_consistent() {
    for shape in ALL_SHAPES {
        let vertices = shape.reference_vertices();
        let centroid = shape.reference_centroid();
        for side in 0..shape.num_sides() {
            let normal = shape.reference_normal(side);
            let side_vertices = shape.side_vertices(side);
            let first = vertices[side_vertices[0]];
            // All side vertices lie in the plane orthogonal to the normal
            for &v in side_vertices {
                let offset: f64 = (0..3).map(|k| (vertices[v][k] - first[k]) * normal[k]).sum();
                assert_scalar_eq!(offset, 0.0, comp = abs, tol = 1e-14);
            }
            // and the centroid lies behind the side
            let centroid_offset: f64 = (0..3).map(|k| (centroid[k] - first[k]) * normal[k]).sum();
            assert!(centroid_offset < 0.0);
        }
    }
}

#[test]
fn quadrilateral_geometry_inverse_map() {
    let vertices = vec![
        Point2::new(0.0, 0.0),
        Point2::new(2.0, 0.2),
        Point2::new(2.5, 1.8),
        Point2::new(-0.3, 1.2),
    ];
    let geometry = ElementGeometry::new(ElementShape::Quadrilateral, vertices.clone());

    assert_matrix_eq!(
        geometry.map_reference_coords(&Point2::new(1.0, 1.0)).coords,
        vertices[2].coords,
        comp = abs,
        tol = 1e-14
    );

    let xi = Point2::new(0.3, -0.6);
    let x = geometry.map_reference_coords(&xi);
    let xi_inverse = geometry.map_physical_coords(&x).unwrap();
    assert_matrix_eq!(xi_inverse.coords, xi.coords, comp = abs, tol = 1e-12);

    // Jacobian is the derivative of the map
    let h = 1e-6;
    let jacobian = geometry.reference_jacobian(&xi);
    for c in 0..2 {
        let mut xi_h = xi;
        xi_h[c] += h;
        let fd = (geometry.map_reference_coords(&xi_h) - x) / h;
        assert_matrix_eq!(jacobian.column(c), fd, comp = abs, tol = 1e-5);
    }
}

#[test]
fn simplex_geometry_is_affine() {
    let vertices = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(0.0, 3.0, 0.0),
        Point3::new(0.0, 0.0, 0.5),
    ];
    let geometry = ElementGeometry::new(ElementShape::Tetrahedron, vertices);
    let jacobian = geometry.reference_jacobian(&Point3::new(0.1, 0.2, 0.3));
    assert_scalar_eq!(jacobian.determinant(), 3.0, comp = abs, tol = 1e-14);
    for hessian in geometry.reference_hessians(&Point3::new(0.2, 0.2, 0.2)) {
        assert_scalar_eq!(hessian.norm(), 0.0, comp = abs, tol = 1e-14);
    }
    assert_scalar_eq!(geometry.diameter(), 13.0f64.sqrt(), comp = abs, tol = 1e-14);
    assert!(geometry.map_physical_coords(&Point3::new(0.5, 0.5, 0.1)).is_some());
}

#[test]
fn hexahedron_geometry_maps_reference_cube() {
    let scale = Vector3::new(2.0, 1.0, 0.5);
    let vertices = ElementShape::Hexahedron
        .reference_vertices()
        .iter()
        .map(|v| Point3::new(v[0], v[1], v[2]) + scale)
        .collect();
    let geometry = ElementGeometry::new(ElementShape::Hexahedron, vertices);
    let x = geometry.map_reference_coords(&Point3::new(0.5, -0.5, 0.0));
    assert_matrix_eq!(x.coords, Vector3::new(2.5, 0.5, 0.5), comp = abs, tol = 1e-14);
    assert_matrix_eq!(
        geometry.reference_jacobian(&Point3::origin()),
        Matrix3::identity(),
        comp = abs,
        tol = 1e-14
    );
}

proptest! {
    #[test]
    fn basis_is_partition_of_unity(unit_coords in vec(0.0..=1.0, 3)) {
        for basis in all_bases() {
            let xi = reference_point(basis.shape(), &unit_coords);
            let sum: f64 = basis_values(&basis, &xi).iter().sum();
            prop_assert!((sum - 1.0).abs() <= 1e-12);

            let gradient_sums = basis_gradients(&basis, &xi).column_sum();
            prop_assert!(gradient_sums.amax() <= 1e-10);
        }
    }

    #[test]
    fn basis_gradients_are_derivatives_of_values(unit_coords in vec(0.1..=0.9, 3)) {
        let h = 1e-6;
        for basis in all_bases() {
            let xi = reference_point(basis.shape(), &unit_coords);
            let gradients = basis_gradients(&basis, &xi);
            let values = basis_values(&basis, &xi);
            for c in 0..basis.reference_dim() {
                let mut xi_h = xi.clone();
                xi_h[c] += h;
                let values_h = basis_values(&basis, &xi_h);
                for i in 0..basis.num_nodes() {
                    let fd = (values_h[i] - values[i]) / h;
                    prop_assert!((gradients[(c, i)] - fd).abs() <= 1e-4 * (1.0 + fd.abs()));
                }
            }
        }
    }

    #[test]
    fn basis_hessians_are_derivatives_of_gradients(unit_coords in vec(0.1..=0.9, 3)) {
        let h = 1e-6;
        for basis in all_bases() {
            let d = basis.reference_dim();
            let xi = reference_point(basis.shape(), &unit_coords);
            let hessians = basis_hessians(&basis, &xi);
            let gradients = basis_gradients(&basis, &xi);
            for b in 0..d {
                let mut xi_h = xi.clone();
                xi_h[b] += h;
                let gradients_h = basis_gradients(&basis, &xi_h);
                for i in 0..basis.num_nodes() {
                    for a in 0..d {
                        let fd = (gradients_h[(a, i)] - gradients[(a, i)]) / h;
                        let hessian = hessians[(a + d * b, i)];
                        prop_assert!((hessian - fd).abs() <= 1e-3 * (1.0 + fd.abs()));
                    }
                }
            }
        }
    }
}
