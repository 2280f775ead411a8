//! Helper traits for allocator trait bounds.
use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, Scalar, U1};

/// An allocator for the spatial dimension of a finite element system.
///
/// Collects everything needed for points, vectors, Jacobians and their decompositions so that
/// generic routines only need a single `DefaultAllocator: DimAllocator<T, D>` bound.
pub trait DimAllocator<T: Scalar, D: DimName>:
    Allocator<T, D>
    + Allocator<T, D, D>
    + Allocator<T, U1, D>
    // Used for decompositions
    + Allocator<usize, D>
    + Allocator<(usize, usize), D>
    // Reference coordinates are generated in f64 before conversion
    + Allocator<f64, D>
{
}

impl<T, D> DimAllocator<T, D> for DefaultAllocator
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>
        + Allocator<T, D, D>
        + Allocator<T, U1, D>
        + Allocator<usize, D>
        + Allocator<(usize, usize), D>
        + Allocator<f64, D>,
{
}
