//! Element-by-element assembly of residuals and Jacobians for nonlinear, implicit and possibly
//! time-dependent finite element systems.
//!
//! A [`FemSystem`](system::FemSystem) owns a set of field variables and a user-supplied
//! [`FemPhysics`](physics::FemPhysics) implementation. Given a mesh, a degree-of-freedom map and
//! the current and fixed solution states, it visits every active element, selects quadrature
//! rules, exposes interpolated fields through an [`ElementContext`](context::ElementContext),
//! invokes the physics callbacks and accumulates the local contributions into global
//! containers. Jacobians that the physics does not supply analytically are approximated by
//! finite differences, and analytic Jacobians can optionally be verified against them.
use nalgebra::{DimMin, DimName, RealField};

pub mod allocators;
pub mod assembly;
pub mod context;
pub mod dof_map;
pub mod element;
pub mod error;
pub mod mesh;
pub mod physics;
pub mod postprocess;
pub mod quadrature;
pub mod system;

pub extern crate femsystem_quadrature;
pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

/// The scalar type used throughout `femsystem`.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// A small, fixed-size dimension.
///
/// Used as a trait alias for various traits frequently needed by generic `femsystem` routines.
pub trait SmallDim: DimName + DimMin<Self, Output = Self> {}

impl<D> SmallDim for D where D: DimName + DimMin<Self, Output = Self> {}
