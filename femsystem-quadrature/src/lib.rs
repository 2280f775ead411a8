//! Quadrature rules for finite element reference domains.
//!
//! The rules are computed on the fly in `f64` precision rather than read from tables, which
//! means that rules of arbitrary polynomial strength are available up to the limit imposed by
//! [`MAX_GAUSS_POINTS`].
//!
//! Reference domains follow the conventions of `femsystem`:
//!
//! - the segment, quadrilateral and hexahedron are `[-1, 1]^d`,
//! - the triangle and tetrahedron are the unit simplices spanned by the origin and the unit
//!   coordinate vectors.

use std::fmt;
use std::fmt::{Display, Formatter};

pub mod simplex;
pub mod tensor;
pub mod univariate;

/// The largest number of points per dimension used by any one-dimensional Gauss rule.
///
/// Rules that would need more points are reported as unavailable.
pub const MAX_GAUSS_POINTS: usize = 50;

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Indicates that a rule satisfying the given requirements is not available.
    NoRuleAvailable {
        /// The requested polynomial strength.
        strength: usize,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRuleAvailable { strength } => {
                write!(
                    f,
                    "There is no quadrature rule of strength {strength} available \
                     (at most {MAX_GAUSS_POINTS} Gauss points per dimension)"
                )
            }
        }
    }
}

impl std::error::Error for Error {}

/// A D-dimensional point.
pub type Point<const D: usize> = [f64; D];

/// A D-dimensional rule.
pub type Rule<const D: usize> = (Vec<f64>, Vec<Point<D>>);

/// A one-dimensional quadrature rule.
pub type Rule1d = Rule<1>;

/// A two-dimensional quadrature rule.
pub type Rule2d = Rule<2>;

/// A three-dimensional rule.
pub type Rule3d = Rule<3>;

/// Number of Gauss points needed to integrate polynomials of degree `strength` exactly.
///
/// A Gauss rule with `n` points is exact for degree `2n - 1`.
pub fn gauss_points_for_strength(strength: usize) -> usize {
    strength / 2 + 1
}

/// Same as [`gauss_points_for_strength`], but fails if more than [`MAX_GAUSS_POINTS`] points
/// would be required.
pub fn checked_gauss_points_for_strength(strength: usize) -> Result<usize, Error> {
    let n = gauss_points_for_strength(strength);
    if n > MAX_GAUSS_POINTS {
        Err(Error::NoRuleAvailable { strength })
    } else {
        Ok(n)
    }
}
