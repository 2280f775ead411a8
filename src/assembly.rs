//! Element-by-element assembly of residuals and Jacobians.
//!
//! - [`local`] evaluates the physics callbacks of a single element, phase by phase, and
//!   produces the element's local contribution.
//! - [`numeric`] approximates local Jacobians with finite differences.
//! - [`global`] accumulates local contributions into global vectors and matrices.
use std::fmt;
use std::fmt::{Display, Formatter};

pub mod global;
pub mod local;
pub mod numeric;

/// The part of an element's contribution produced by one group of physics callbacks.
///
/// Jacobians are computed, approximated and verified per phase.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Element time derivative and element constraint.
    Interior,
    /// Side time derivative and side constraint of the given side.
    Side(usize),
    /// The mass residual of time-evolving variables.
    Mass,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interior => write!(f, "interior"),
            Self::Side(side) => write!(f, "side {side}"),
            Self::Mass => write!(f, "mass"),
        }
    }
}
