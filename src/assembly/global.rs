//! Global accumulation targets and sparsity patterns.
use crate::dof_map::DofMap;
use crate::error::AssemblyError;
use crate::Real;
use itertools::izip;
use nalgebra::{DMatrix, DVector, Scalar};
use nalgebra_sparse::pattern::SparsityPattern;
use nalgebra_sparse::CsrMatrix;
use std::collections::BTreeSet;

/// A global vector that local element vectors can be added to.
pub trait GlobalVector<T: Scalar> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set_zero(&mut self);

    /// Adds `local[i]` to the global entry `dofs[i]` for every `i`.
    fn add_local(&mut self, dofs: &[usize], local: &DVector<T>);
}

/// A global matrix that local element matrices can be added to.
pub trait GlobalMatrix<T: Scalar> {
    fn nrows(&self) -> usize;

    fn ncols(&self) -> usize;

    fn set_zero(&mut self);

    /// Checks that a local matrix with the given global indices can be added, without modifying
    /// the matrix.
    fn validate_local(&self, _dofs: &[usize]) -> Result<(), AssemblyError> {
        Ok(())
    }

    /// Adds `local[(i, j)]` to the global entry `(dofs[i], dofs[j])` for every `i` and `j`.
    ///
    /// If an error is returned, some entries may already have been added. Use
    /// [`validate_local`](Self::validate_local) to rule this out beforehand.
    fn add_local(&mut self, dofs: &[usize], local: &DMatrix<T>) -> eyre::Result<()>;
}

impl<T: Real> GlobalVector<T> for DVector<T> {
    fn len(&self) -> usize {
        self.nrows()
    }

    fn set_zero(&mut self) {
        self.fill(T::zero());
    }

    fn add_local(&mut self, dofs: &[usize], local: &DVector<T>) {
        assert_eq!(dofs.len(), local.len(), "Need one global index per local entry");
        for (&i, &value) in izip!(dofs, local.iter()) {
            self[i] += value;
        }
    }
}

impl<T: Real> GlobalMatrix<T> for DMatrix<T> {
    fn nrows(&self) -> usize {
        self.shape().0
    }

    fn ncols(&self) -> usize {
        self.shape().1
    }

    fn set_zero(&mut self) {
        self.fill(T::zero());
    }

    fn add_local(&mut self, dofs: &[usize], local: &DMatrix<T>) -> eyre::Result<()> {
        assert_eq!(local.shape(), (dofs.len(), dofs.len()), "Local matrix must match global indices");
        for (local_row, &row) in dofs.iter().enumerate() {
            for (local_col, &col) in dofs.iter().enumerate() {
                self[(row, col)] += local[(local_row, local_col)];
            }
        }
        Ok(())
    }
}

impl<T: Real> GlobalMatrix<T> for CsrMatrix<T> {
    fn nrows(&self) -> usize {
        CsrMatrix::nrows(self)
    }

    fn ncols(&self) -> usize {
        CsrMatrix::ncols(self)
    }

    fn set_zero(&mut self) {
        self.values_mut().fill(T::zero());
    }

    fn validate_local(&self, dofs: &[usize]) -> Result<(), AssemblyError> {
        for &row in dofs {
            let missing = |col| AssemblyError::MissingSparsityEntry { row, col };
            if row >= CsrMatrix::nrows(self) {
                return Err(missing(dofs[0]));
            }
            let row_view = self.row(row);
            let col_indices = row_view.col_indices();
            if let Some(&col) = dofs
                .iter()
                .find(|col| col_indices.binary_search(col).is_err())
            {
                return Err(missing(col));
            }
        }
        Ok(())
    }

    fn add_local(&mut self, dofs: &[usize], local: &DMatrix<T>) -> eyre::Result<()> {
        assert_eq!(local.shape(), (dofs.len(), dofs.len()), "Local matrix must match global indices");
        let mut sorted_permutation: Vec<usize> = (0..dofs.len()).collect();
        sorted_permutation.sort_unstable_by_key(|&i| dofs[i]);

        for (local_row, &row) in dofs.iter().enumerate() {
            if row >= CsrMatrix::nrows(self) {
                return Err(AssemblyError::MissingSparsityEntry { row, col: dofs[0] }.into());
            }
            let mut csr_row = self.row_mut(row);
            let (col_indices, values) = csr_row.cols_and_values_mut();
            add_local_row_to_csr_row(col_indices, values, row, dofs, &sorted_permutation, |local_col| {
                local[(local_row, local_col)]
            })?;
        }
        Ok(())
    }
}

/// Adds a row of a local matrix to the provided row of a CSR matrix.
///
/// `sorted_permutation` orders the local indices such that the corresponding global indices
/// are sorted, so that the CSR row only needs to be traversed once.
fn add_local_row_to_csr_row<T: Real>(
    col_indices: &[usize],
    values: &mut [T],
    row: usize,
    dofs: &[usize],
    sorted_permutation: &[usize],
    local_row: impl Fn(usize) -> T,
) -> Result<(), AssemblyError> {
    let mut csr_idx = 0;
    for &local_col in sorted_permutation {
        let col = dofs[local_col];
        while csr_idx < col_indices.len() && col_indices[csr_idx] < col {
            csr_idx += 1;
        }
        if csr_idx == col_indices.len() || col_indices[csr_idx] != col {
            return Err(AssemblyError::MissingSparsityEntry { row, col });
        }
        values[csr_idx] += local_row(local_col);
    }
    Ok(())
}

/// The residual, Jacobian, mass residual and mass Jacobian targets of an assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalSystem<V, M> {
    pub residual: V,
    pub jacobian: M,
    pub mass_residual: V,
    pub mass_jacobian: M,
}

impl<T: Real> GlobalSystem<DVector<T>, DMatrix<T>> {
    /// Zeroed dense targets for the given number of degrees of freedom.
    pub fn dense(num_dofs: usize) -> Self {
        Self {
            residual: DVector::zeros(num_dofs),
            jacobian: DMatrix::zeros(num_dofs, num_dofs),
            mass_residual: DVector::zeros(num_dofs),
            mass_jacobian: DMatrix::zeros(num_dofs, num_dofs),
        }
    }
}

impl<T: Real> GlobalSystem<DVector<T>, CsrMatrix<T>> {
    /// Zeroed targets whose matrices share the given sparsity pattern.
    pub fn csr(pattern: SparsityPattern) -> Self {
        let num_dofs = pattern.major_dim();
        let zeros = || {
            let values = vec![T::zero(); pattern.nnz()];
            CsrMatrix::try_from_pattern_and_values(pattern.clone(), values)
                .expect("Number of values always matches the pattern")
        };
        Self {
            residual: DVector::zeros(num_dofs),
            jacobian: zeros(),
            mass_residual: DVector::zeros(num_dofs),
            mass_jacobian: zeros(),
        }
    }
}

/// Builds the sparsity pattern of the global matrices, coupling all degrees of freedom of all
/// variables on each element.
pub fn assemble_sparsity_pattern(dof_map: &(impl DofMap + ?Sized)) -> SparsityPattern {
    // Collecting into a BTreeSet stores each entry exactly once, which keeps memory usage low
    // when many elements share degrees of freedom
    let mut matrix_entries = BTreeSet::new();
    let mut element_dofs = Vec::new();
    for element in 0..dof_map.num_elements() {
        element_dofs.clear();
        for variable in 0..dof_map.num_variables() {
            element_dofs.extend_from_slice(dof_map.element_dofs(element, variable));
        }
        for &i in &element_dofs {
            for &j in &element_dofs {
                matrix_entries.insert((i, j));
            }
        }
    }

    let num_rows = dof_map.num_dofs();
    let mut offsets = Vec::with_capacity(num_rows + 1);
    let mut column_indices = Vec::with_capacity(matrix_entries.len());

    offsets.push(0);
    for (i, j) in matrix_entries {
        while i + 1 > offsets.len() {
            // A new row. Loop to correctly handle consecutive empty rows
            offsets.push(column_indices.len());
        }
        column_indices.push(j);
    }

    // Fill out the remaining offsets if the last rows are empty
    while offsets.len() < (num_rows + 1) {
        offsets.push(column_indices.len());
    }

    SparsityPattern::try_from_offsets_and_indices(num_rows, num_rows, offsets, column_indices)
        .expect("Offsets and indices are sorted and in bounds by construction")
}
