//! Finite difference approximation of Jacobians.
use crate::Real;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// The difference quotient used to approximate derivatives.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FiniteDifferenceScheme {
    /// `(f(x + h e_i) - f(x)) / h`.
    #[default]
    Forward,
    /// `(f(x + h e_i) - f(x - h e_i)) / 2h`.
    Central,
}

/// Approximates the Jacobian of the function $f: \mathbb{R}^n \rightarrow \mathbb{R}^m$
/// with finite differences.
///
/// `f(x, out)` must write $f(x)$ into `out`. The entries of `x` are perturbed one at a time and
/// restored afterwards, also when `f` fails.
pub fn finite_difference_jacobian<'a, T>(
    m: usize,
    mut f: impl FnMut(DVectorView<T>, DVectorViewMut<T>) -> eyre::Result<()>,
    x: impl Into<DVectorViewMut<'a, T>>,
    h: T,
    scheme: FiniteDifferenceScheme,
) -> eyre::Result<DMatrix<T>>
where
    T: Real,
{
    let mut x = x.into();
    let n = x.len();
    let mut jacobian = DMatrix::zeros(m, n);

    // f(x) for forward differences, f(x - h e_i) for central differences
    let mut f_base = DVector::zeros(m);
    let mut f_plus = DVector::zeros(m);
    if scheme == FiniteDifferenceScheme::Forward {
        f(DVectorView::from(&x), DVectorViewMut::from(&mut f_base))?;
    }

    for i in 0..n {
        let xi = x[i];
        x[i] = xi + h;
        let result = f(DVectorView::from(&x), DVectorViewMut::from(&mut f_plus));
        x[i] = xi;
        result?;

        if scheme == FiniteDifferenceScheme::Central {
            x[i] = xi - h;
            let result = f(DVectorView::from(&x), DVectorViewMut::from(&mut f_base));
            x[i] = xi;
            result?;
        }

        let mut df_dxi = jacobian.column_mut(i);
        df_dxi.copy_from(&f_plus);
        df_dxi -= &f_base;
        df_dxi /= step_width(h, scheme);
    }

    Ok(jacobian)
}

#[replace_float_literals(T::from_f64(literal).unwrap())]
fn step_width<T: Real>(h: T, scheme: FiniteDifferenceScheme) -> T {
    match scheme {
        FiniteDifferenceScheme::Forward => h,
        FiniteDifferenceScheme::Central => 2.0 * h,
    }
}

/// The induced matrix 1-norm, i.e. the largest absolute column sum.
pub fn matrix_one_norm<T: Real>(matrix: &DMatrix<T>) -> T {
    matrix
        .column_iter()
        .map(|column| column.iter().fold(T::zero(), |sum, x| sum + x.abs()))
        .fold(T::zero(), T::max)
}

/// The discrepancy `||approx - reference||_1 / ||reference||_1` in the induced 1-norm.
///
/// If `reference` is zero, the absolute discrepancy `||approx||_1` is returned instead.
///
/// # Panics
///
/// Panics if the matrices have different dimensions.
pub fn relative_discrepancy<T: Real>(approx: &DMatrix<T>, reference: &DMatrix<T>) -> T {
    assert_eq!(approx.shape(), reference.shape(), "Matrix dimensions must agree");
    let difference = matrix_one_norm(&(approx - reference));
    let reference_norm = matrix_one_norm(reference);
    if reference_norm > T::zero() {
        difference / reference_norm
    } else {
        difference
    }
}
