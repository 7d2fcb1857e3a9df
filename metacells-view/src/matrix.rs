//! Row-major 2-D views with an explicit row stride.
//!
//! The row stride may exceed the column count, so a matrix view can alias a
//! sub-region of a larger buffer. Rows are always contiguous.

use crate::array::{ArrayView, ArrayViewMut};
use crate::disjoint::DisjointRows;
use crate::{ensure_cmp, Result};

/// Validate the matrix geometry against a buffer of `len` elements.
fn validate_geometry(
    name: &'static str,
    len: usize,
    rows: usize,
    columns: usize,
    row_stride: usize,
) -> Result<()> {
    ensure_cmp!(ShapeMismatch, name, columns, <=, row_stride);
    let required = if rows == 0 {
        0
    } else {
        (rows - 1) * row_stride + columns
    };
    ensure_cmp!(SizeMismatch, name, required, <=, len);
    Ok(())
}

/// Translate a host array description (dims/strides) to `(rows, columns, row_stride)`.
fn strided_geometry(
    name: &'static str,
    dims: &[usize],
    strides: &[isize],
) -> Result<(usize, usize, usize)> {
    ensure_cmp!(ShapeMismatch, name, dims.len(), ==, 2);
    ensure_cmp!(ShapeMismatch, name, strides.len(), ==, 2);
    let (rows, columns) = (dims[0], dims[1]);
    if columns > 1 {
        ensure_cmp!(ShapeMismatch, name, strides[1], ==, 1);
    }
    if rows > 1 {
        ensure_cmp!(ShapeMismatch, name, strides[0], >=, 0);
        Ok((rows, columns, strides[0] as usize))
    } else {
        Ok((rows, columns, columns))
    }
}

#[inline]
fn row_start(row: usize, row_stride: usize) -> usize {
    row * row_stride
}

// ============================================================================
// MatrixView
// ============================================================================

/// Immutable row-major matrix window.
pub struct MatrixView<'a, T> {
    data: &'a [T],
    rows: usize,
    columns: usize,
    row_stride: usize,
    name: &'static str,
}

impl<T> Clone for MatrixView<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MatrixView<'_, T> {}

impl<T> std::fmt::Debug for MatrixView<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixView")
            .field("name", &self.name)
            .field("rows", &self.rows)
            .field("columns", &self.columns)
            .field("row_stride", &self.row_stride)
            .finish()
    }
}

impl<'a, T> MatrixView<'a, T> {
    /// Create a matrix view with an explicit row stride.
    pub fn new(
        data: &'a [T],
        rows: usize,
        columns: usize,
        row_stride: usize,
        name: &'static str,
    ) -> Result<Self> {
        validate_geometry(name, data.len(), rows, columns, row_stride)?;
        Ok(Self {
            data,
            rows,
            columns,
            row_stride,
            name,
        })
    }

    /// Create a dense row-major view (`row_stride == columns`).
    pub fn row_major(
        data: &'a [T],
        rows: usize,
        columns: usize,
        name: &'static str,
    ) -> Result<Self> {
        Self::new(data, rows, columns, columns, name)
    }

    /// Create a view from a host array description.
    ///
    /// The description must be two-dimensional with contiguous rows.
    pub fn from_strided(
        data: &'a [T],
        dims: &[usize],
        strides: &[isize],
        name: &'static str,
    ) -> Result<Self> {
        let (rows, columns, row_stride) = strided_geometry(name, dims, strides)?;
        Self::new(data, rows, columns, row_stride, name)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    #[inline]
    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// View of row `row`, aliasing the matrix buffer.
    pub fn get_row(&self, row: usize) -> Result<ArrayView<'a, T>> {
        ensure_cmp!(BoundsViolation, self.name, row, <, self.rows);
        let start = row_start(row, self.row_stride);
        Ok(ArrayView::new(
            &self.data[start..start + self.columns],
            self.name,
        ))
    }
}

// ============================================================================
// MatrixViewMut
// ============================================================================

/// Mutable row-major matrix window.
pub struct MatrixViewMut<'a, T> {
    data: &'a mut [T],
    rows: usize,
    columns: usize,
    row_stride: usize,
    name: &'static str,
}

impl<T> std::fmt::Debug for MatrixViewMut<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixViewMut")
            .field("name", &self.name)
            .field("rows", &self.rows)
            .field("columns", &self.columns)
            .field("row_stride", &self.row_stride)
            .finish()
    }
}

impl<'a, T> MatrixViewMut<'a, T> {
    pub fn new(
        data: &'a mut [T],
        rows: usize,
        columns: usize,
        row_stride: usize,
        name: &'static str,
    ) -> Result<Self> {
        validate_geometry(name, data.len(), rows, columns, row_stride)?;
        Ok(Self {
            data,
            rows,
            columns,
            row_stride,
            name,
        })
    }

    pub fn row_major(
        data: &'a mut [T],
        rows: usize,
        columns: usize,
        name: &'static str,
    ) -> Result<Self> {
        Self::new(data, rows, columns, columns, name)
    }

    pub fn from_strided(
        data: &'a mut [T],
        dims: &[usize],
        strides: &[isize],
        name: &'static str,
    ) -> Result<Self> {
        let (rows, columns, row_stride) = strided_geometry(name, dims, strides)?;
        Self::new(data, rows, columns, row_stride, name)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    #[inline]
    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Reborrow as an immutable view.
    pub fn as_view(&self) -> MatrixView<'_, T> {
        MatrixView {
            data: self.data,
            rows: self.rows,
            columns: self.columns,
            row_stride: self.row_stride,
            name: self.name,
        }
    }

    pub fn get_row(&self, row: usize) -> Result<ArrayView<'_, T>> {
        ensure_cmp!(BoundsViolation, self.name, row, <, self.rows);
        let start = row_start(row, self.row_stride);
        Ok(ArrayView::new(
            &self.data[start..start + self.columns],
            self.name,
        ))
    }

    pub fn get_row_mut(&mut self, row: usize) -> Result<ArrayViewMut<'_, T>> {
        ensure_cmp!(BoundsViolation, self.name, row, <, self.rows);
        let start = row_start(row, self.row_stride);
        Ok(ArrayViewMut::new(
            &mut self.data[start..start + self.columns],
            self.name,
        ))
    }

    /// Hand out rows to concurrent workers, one row per unit of work.
    pub fn share(&mut self) -> DisjointRows<'_, T> {
        DisjointRows::new(
            ArrayViewMut::new(self.data, self.name),
            self.rows,
            self.columns,
            self.row_stride,
        )
    }
}

impl<'a, T> From<MatrixViewMut<'a, T>> for MatrixView<'a, T> {
    fn from(view: MatrixViewMut<'a, T>) -> Self {
        MatrixView {
            data: view.data,
            rows: view.rows,
            columns: view.columns,
            row_stride: view.row_stride,
            name: view.name,
        }
    }
}
