//! Concurrent access to non-overlapping windows of one mutable buffer.
//!
//! Kernels fan out one unit of work per row or band. Each unit owns a window
//! of the output that no other unit touches, but the borrow checker cannot see
//! that the windows are disjoint when they are computed from runtime offsets.
//! [`Disjoint`] holds the mutable borrow for the duration of the fan-out and
//! hands out windows through `unsafe` accessors whose contract is exactly that
//! non-overlap. The compressed scatter uses single-slot writes instead, with
//! slots handed out by an atomic cursor.

use std::marker::PhantomData;

use crate::array::{validate_range, ArrayView, ArrayViewMut};
use crate::{ensure_cmp, IndexElement, Result};

/// A raw pointer wrapper that is `Send` + `Sync`.
///
/// # Safety
/// The caller must guarantee that the pointed-to data is valid for the
/// lifetime of any parallel operation and that no data races occur
/// (e.g., different threads write to disjoint regions).
struct SendPtr<T>(*mut T);

impl<T> Clone for SendPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SendPtr<T> {}

unsafe impl<T> Send for SendPtr<T> {}
unsafe impl<T> Sync for SendPtr<T> {}

// ============================================================================
// Disjoint
// ============================================================================

/// Shared handle to a mutable buffer for concurrent, non-overlapping access.
///
/// Bounds are checked on every access; non-overlap is the caller's contract.
pub struct Disjoint<'a, T> {
    ptr: SendPtr<T>,
    len: usize,
    name: &'static str,
    _marker: PhantomData<&'a mut [T]>,
}

impl<'a, T> Disjoint<'a, T> {
    pub fn new(view: ArrayViewMut<'a, T>) -> Self {
        let name = view.name();
        let data = view.into_slice();
        Self {
            ptr: SendPtr(data.as_mut_ptr()),
            len: data.len(),
            name,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Mutable window over `[start, stop)`.
    ///
    /// # Safety
    /// While the returned view is alive, no other window or write of this
    /// handle may overlap `[start, stop)`.
    pub unsafe fn window(&self, start: usize, stop: usize) -> Result<ArrayViewMut<'a, T>> {
        let range = validate_range(self.name, self.len, start, stop)?;
        let data = std::slice::from_raw_parts_mut(self.ptr.0.add(range.start), range.len());
        Ok(ArrayViewMut::new(data, self.name))
    }
}

impl<T: Copy> Disjoint<'_, T> {
    /// Store `value` at `position`.
    ///
    /// # Safety
    /// No other unit may access `position` concurrently.
    #[inline]
    pub unsafe fn write(&self, position: usize, value: T) -> Result<()> {
        ensure_cmp!(BoundsViolation, self.name, position, <, self.len);
        self.ptr.0.add(position).write(value);
        Ok(())
    }
}

// ============================================================================
// DisjointRows
// ============================================================================

/// Rows of a mutable matrix handed out to concurrent workers.
///
/// Rows never overlap because the row stride is at least the column count.
pub struct DisjointRows<'a, T> {
    inner: Disjoint<'a, T>,
    rows: usize,
    columns: usize,
    row_stride: usize,
}

impl<'a, T> DisjointRows<'a, T> {
    pub(crate) fn new(
        data: ArrayViewMut<'a, T>,
        rows: usize,
        columns: usize,
        row_stride: usize,
    ) -> Self {
        Self {
            inner: Disjoint::new(data),
            rows,
            columns,
            row_stride,
        }
    }

    /// Treat a flat buffer as consecutive rows of `columns` elements.
    pub fn chunks(data: ArrayViewMut<'a, T>, columns: usize) -> Result<Self> {
        let rows = if columns == 0 { 0 } else { data.len() / columns };
        ensure_cmp!(SizeMismatch, data.name(), rows * columns, ==, data.len());
        Ok(Self::new(data, rows, columns, columns))
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Mutable view of row `row`.
    ///
    /// # Safety
    /// Each row may be held by at most one unit of work at a time.
    pub unsafe fn row(&self, row: usize) -> Result<ArrayViewMut<'a, T>> {
        ensure_cmp!(BoundsViolation, self.inner.name, row, <, self.rows);
        let start = row * self.row_stride;
        self.inner.window(start, start + self.columns)
    }
}

// ============================================================================
// DisjointBands
// ============================================================================

/// Bands of a mutable compressed matrix handed out to concurrent workers.
///
/// Bands never overlap because the offset buffer was validated as monotonic
/// when the compressed view was created.
pub struct DisjointBands<'a, D, I, P> {
    data: Disjoint<'a, D>,
    indices: Disjoint<'a, I>,
    indptr: ArrayView<'a, P>,
}

impl<'a, D, I, P: IndexElement> DisjointBands<'a, D, I, P> {
    pub(crate) fn new(
        data: ArrayViewMut<'a, D>,
        indices: ArrayViewMut<'a, I>,
        indptr: ArrayView<'a, P>,
    ) -> Self {
        Self {
            data: Disjoint::new(data),
            indices: Disjoint::new(indices),
            indptr,
        }
    }

    #[inline]
    pub fn bands(&self) -> usize {
        self.indptr.len() - 1
    }

    /// Mutable data and index windows of band `band`.
    ///
    /// # Safety
    /// Each band may be held by at most one unit of work at a time.
    pub unsafe fn band(&self, band: usize) -> Result<(ArrayViewMut<'a, D>, ArrayViewMut<'a, I>)> {
        ensure_cmp!(BoundsViolation, self.indptr.name(), band, <, self.bands());
        let start = self.indptr[band].as_position();
        let stop = self.indptr[band + 1].as_position();
        Ok((
            self.data.window(start, stop)?,
            self.indices.window(start, stop)?,
        ))
    }
}
