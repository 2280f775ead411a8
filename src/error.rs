//! Error types reported by system setup, assembly and point evaluation.
//!
//! Fallible entry points return [`eyre::Result`], so that user physics can propagate arbitrary
//! errors with `?`. The errors raised by `femsystem` itself are the typed enums in this module,
//! and can be recovered from a report with [`eyre::Report::downcast_ref`].
use crate::assembly::Phase;
use crate::element::{ElementShape, FeType};
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

/// Invalid system setup, detected before any assembly runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The system was initialized without any variables.
    NoVariables,
    /// No quadrature rule of the required strength is available for the shape.
    NoQuadratureRule { shape: ElementShape, strength: usize },
    /// The finite element type can not be used on the given shape and refinement level.
    UnsupportedFiniteElement {
        fe_type: FeType,
        shape: ElementShape,
        p_level: usize,
    },
    /// A variable index does not refer to a registered variable.
    UnknownVariable { variable: usize, num_variables: usize },
    /// Variables can no longer be registered or modified after initialization.
    SystemFinalized,
    /// Assembly was requested before the system was initialized.
    NotInitialized,
    /// A [`FemSystemSettings`](crate::system::FemSystemSettings) field has an unusable value.
    InvalidSetting { name: &'static str, requirement: &'static str },
    /// The degree-of-freedom map, solution state or global containers disagree with the system.
    DofMapMismatch {
        quantity: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoVariables => write!(f, "The system has no variables"),
            Self::NoQuadratureRule { shape, strength } => {
                write!(f, "No quadrature rule of strength {strength} is available for {shape}")
            }
            Self::UnsupportedFiniteElement {
                fe_type,
                shape,
                p_level,
            } => {
                write!(f, "Finite element {fe_type} is not supported on {shape} with p-level {p_level}")
            }
            Self::UnknownVariable {
                variable,
                num_variables,
            } => {
                write!(f, "Variable {variable} does not exist (the system has {num_variables} variables)")
            }
            Self::SystemFinalized => write!(f, "The system has already been initialized"),
            Self::NotInitialized => write!(f, "The system must be initialized before use"),
            Self::InvalidSetting { name, requirement } => write!(f, "Invalid setting {name}: must be {requirement}"),
            Self::DofMapMismatch {
                quantity,
                expected,
                actual,
            } => {
                write!(f, "Mismatched {quantity}: expected {expected}, got {actual}")
            }
        }
    }
}

impl Error for ConfigurationError {}

/// Fatal failures during assembly.
///
/// None of these are retried: any of them aborts the assembly before the global containers are
/// touched.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyError {
    /// The element geometry has a non-positive or non-finite Jacobian determinant.
    DegenerateElement { element: usize, determinant: f64 },
    /// An analytic Jacobian differs from its finite difference approximation by more than the
    /// configured tolerance.
    JacobianMismatch {
        element: usize,
        phase: Phase,
        relative_error: f64,
        tolerance: f64,
    },
    /// A local contribution touches an entry outside the sparsity pattern of the global matrix.
    MissingSparsityEntry { row: usize, col: usize },
}

impl Display for AssemblyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegenerateElement { element, determinant } => {
                write!(f, "Element {element} is degenerate (Jacobian determinant {determinant:e})")
            }
            Self::JacobianMismatch {
                element,
                phase,
                relative_error,
                tolerance,
            } => {
                write!(
                    f,
                    "Analytic Jacobian of element {element} ({phase}) does not match its finite difference \
                     approximation: relative error {relative_error:e} exceeds tolerance {tolerance:e}"
                )
            }
            Self::MissingSparsityEntry { row, col } => {
                write!(f, "Entry ({row}, {col}) is not part of the sparsity pattern")
            }
        }
    }
}

impl Error for AssemblyError {}

/// Failures when evaluating a field at an arbitrary point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// The point does not lie inside the current element.
    PointOutsideElement { element: usize },
    /// The inverse of the element map could not be computed at the point.
    InverseMapFailed { element: usize },
}

impl Display for EvaluationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::PointOutsideElement { element } => {
                write!(f, "The point lies outside of element {element}")
            }
            Self::InverseMapFailed { element } => {
                write!(f, "Failed to map the point to reference coordinates of element {element}")
            }
        }
    }
}

impl Error for EvaluationError {}
