//! Band-oriented sparse (CSR/CSC) views.
//!
//! A compressed matrix is three parallel buffers: `data` holds the stored
//! values, `indices` the position of each value within the element domain
//! (the column of a CSR matrix, the row of a CSC matrix), and `indptr` the
//! `bands + 1` monotonic offsets delimiting each band's slice of the other two.

use std::ops::Range;

use crate::array::{ArrayView, ArrayViewMut};
use crate::disjoint::DisjointBands;
use crate::{ensure_cmp, IndexElement, Result};

/// Validate an offset buffer delimiting `nnz` stored entries.
///
/// Offsets must be non-decreasing, and the last one must equal `nnz`.
pub fn validate_indptr<P: IndexElement>(indptr: ArrayView<'_, P>, nnz: usize) -> Result<()> {
    let name = indptr.name();
    ensure_cmp!(SizeMismatch, name, indptr.len(), >=, 1);
    let mut previous = indptr[0].as_position();
    for offset in indptr.iter().skip(1) {
        let offset = offset.as_position();
        ensure_cmp!(OrderViolation, name, previous, <=, offset);
        previous = offset;
    }
    ensure_cmp!(SizeMismatch, name, previous, ==, nnz);
    Ok(())
}

fn validate_structure<P: IndexElement>(
    name: &'static str,
    data_len: usize,
    indices_len: usize,
    indptr: ArrayView<'_, P>,
) -> Result<()> {
    ensure_cmp!(SizeMismatch, name, data_len, ==, indices_len);
    validate_indptr(indptr, data_len)
}

/// Per-element check that every index lies in the element domain.
#[cfg(debug_assertions)]
fn debug_check_indices<I: IndexElement>(name: &'static str, indices: &[I], elements_count: usize) {
    for index in indices {
        debug_assert!(
            index.as_position() < elements_count,
            "{}: index {:?} out of bounds for {} elements",
            name,
            index,
            elements_count
        );
    }
}

#[cfg(not(debug_assertions))]
#[inline(always)]
fn debug_check_indices<I: IndexElement>(_name: &'static str, _indices: &[I], _elements_count: usize) {}

#[inline]
fn band_range<P: IndexElement>(
    name: &'static str,
    indptr: &ArrayView<'_, P>,
    band: usize,
) -> Result<Range<usize>> {
    ensure_cmp!(BoundsViolation, name, band + 1, <, indptr.len());
    Ok(indptr[band].as_position()..indptr[band + 1].as_position())
}

// ============================================================================
// CompressedView
// ============================================================================

/// Immutable compressed sparse matrix view.
pub struct CompressedView<'a, D, I, P> {
    data: ArrayView<'a, D>,
    indices: ArrayView<'a, I>,
    indptr: ArrayView<'a, P>,
    elements_count: usize,
    name: &'static str,
}

impl<D, I, P> Clone for CompressedView<'_, D, I, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D, I, P> Copy for CompressedView<'_, D, I, P> {}

impl<D, I, P> std::fmt::Debug for CompressedView<'_, D, I, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedView")
            .field("name", &self.name)
            .field("bands", &(self.indptr.len().saturating_sub(1)))
            .field("elements_count", &self.elements_count)
            .field("nnz", &self.data.len())
            .finish()
    }
}

impl<'a, D, I: IndexElement, P: IndexElement> CompressedView<'a, D, I, P> {
    /// Create a compressed view over the three buffers.
    ///
    /// `elements_count` is the size of the element domain (the number of
    /// columns of a CSR matrix).
    pub fn new(
        data: ArrayView<'a, D>,
        indices: ArrayView<'a, I>,
        indptr: ArrayView<'a, P>,
        elements_count: usize,
        name: &'static str,
    ) -> Result<Self> {
        validate_structure(name, data.len(), indices.len(), indptr)?;
        debug_check_indices(name, indices.as_slice(), elements_count);
        Ok(Self {
            data,
            indices,
            indptr,
            elements_count,
            name,
        })
    }

    #[inline]
    pub fn bands(&self) -> usize {
        self.indptr.len() - 1
    }

    #[inline]
    pub fn elements_count(&self) -> usize {
        self.elements_count
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn data(&self) -> ArrayView<'a, D> {
        self.data
    }

    #[inline]
    pub fn indices(&self) -> ArrayView<'a, I> {
        self.indices
    }

    #[inline]
    pub fn indptr(&self) -> ArrayView<'a, P> {
        self.indptr
    }

    /// Positions `[indptr[band], indptr[band + 1])` of the band's entries.
    pub fn band_range(&self, band: usize) -> Result<Range<usize>> {
        band_range(self.name, &self.indptr, band)
    }

    /// Number of stored entries of the band.
    pub fn band_len(&self, band: usize) -> Result<usize> {
        Ok(self.band_range(band)?.len())
    }

    /// Data and index sub-slices of band `band`.
    pub fn band(&self, band: usize) -> Result<(ArrayView<'a, D>, ArrayView<'a, I>)> {
        let range = self.band_range(band)?;
        Ok((
            self.data.slice(range.start, range.end)?,
            self.indices.slice(range.start, range.end)?,
        ))
    }
}

// ============================================================================
// CompressedViewMut
// ============================================================================

/// Compressed sparse matrix view with mutable data and indices.
///
/// The offset buffer stays immutable, so the band structure cannot change
/// while kernels permute or rescale entries within bands.
pub struct CompressedViewMut<'a, D, I, P> {
    data: ArrayViewMut<'a, D>,
    indices: ArrayViewMut<'a, I>,
    indptr: ArrayView<'a, P>,
    elements_count: usize,
    name: &'static str,
}

impl<D, I, P> std::fmt::Debug for CompressedViewMut<'_, D, I, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedViewMut")
            .field("name", &self.name)
            .field("bands", &(self.indptr.len().saturating_sub(1)))
            .field("elements_count", &self.elements_count)
            .field("nnz", &self.data.len())
            .finish()
    }
}

impl<'a, D, I: IndexElement, P: IndexElement> CompressedViewMut<'a, D, I, P> {
    pub fn new(
        data: ArrayViewMut<'a, D>,
        indices: ArrayViewMut<'a, I>,
        indptr: ArrayView<'a, P>,
        elements_count: usize,
        name: &'static str,
    ) -> Result<Self> {
        validate_structure(name, data.len(), indices.len(), indptr)?;
        debug_check_indices(name, indices.as_slice(), elements_count);
        Ok(Self {
            data,
            indices,
            indptr,
            elements_count,
            name,
        })
    }

    #[inline]
    pub fn bands(&self) -> usize {
        self.indptr.len() - 1
    }

    #[inline]
    pub fn elements_count(&self) -> usize {
        self.elements_count
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn indptr(&self) -> ArrayView<'a, P> {
        self.indptr
    }

    /// Reborrow as an immutable view.
    pub fn as_view(&self) -> CompressedView<'_, D, I, P> {
        CompressedView {
            data: self.data.as_view(),
            indices: self.indices.as_view(),
            indptr: self.indptr,
            elements_count: self.elements_count,
            name: self.name,
        }
    }

    pub fn band_range(&self, band: usize) -> Result<Range<usize>> {
        band_range(self.name, &self.indptr, band)
    }

    /// Mutable data and index sub-slices of band `band`.
    pub fn band_mut(
        &mut self,
        band: usize,
    ) -> Result<(ArrayViewMut<'_, D>, ArrayViewMut<'_, I>)> {
        let range = self.band_range(band)?;
        Ok((
            self.data.slice_mut(range.start, range.end)?,
            self.indices.slice_mut(range.start, range.end)?,
        ))
    }

    /// Hand out bands to concurrent workers, one band per unit of work.
    pub fn share(&mut self) -> DisjointBands<'_, D, I, P> {
        DisjointBands::new(self.data.reborrow(), self.indices.reborrow(), self.indptr)
    }
}
