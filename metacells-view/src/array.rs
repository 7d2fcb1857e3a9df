//! Contiguous 1-D views.
//!
//! - [`ArrayView`]: immutable window, `Copy`
//! - [`ArrayViewMut`]: mutable window, converts into [`ArrayView`]

use std::ops::{Index, IndexMut, Range};

use crate::{ensure_cmp, Result};

// ============================================================================
// Validation helpers
// ============================================================================

/// Validate a `[start, stop)` window of a buffer of `len` elements.
pub(crate) fn validate_range(
    name: &'static str,
    len: usize,
    start: usize,
    stop: usize,
) -> Result<Range<usize>> {
    ensure_cmp!(OrderViolation, name, start, <=, stop);
    ensure_cmp!(BoundsViolation, name, stop, <=, len);
    Ok(start..stop)
}

/// Validate a host array description (dims/strides) as a contiguous 1-D region.
///
/// Returns the number of elements.
fn validate_contiguous(
    name: &'static str,
    len: usize,
    dims: &[usize],
    strides: &[isize],
) -> Result<usize> {
    ensure_cmp!(ShapeMismatch, name, dims.len(), ==, 1);
    ensure_cmp!(ShapeMismatch, name, strides.len(), ==, 1);
    if dims[0] > 1 {
        ensure_cmp!(ShapeMismatch, name, strides[0], ==, 1);
    }
    ensure_cmp!(SizeMismatch, name, dims[0], <=, len);
    Ok(dims[0])
}

// ============================================================================
// ArrayView
// ============================================================================

/// Immutable bounds-checked window over a contiguous buffer.
///
/// The `name` labels the view in contract-violation diagnostics.
pub struct ArrayView<'a, T> {
    data: &'a [T],
    name: &'static str,
}

impl<T> Clone for ArrayView<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArrayView<'_, T> {}

impl<T: std::fmt::Debug> std::fmt::Debug for ArrayView<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayView")
            .field("name", &self.name)
            .field("data", &self.data)
            .finish()
    }
}

impl<'a, T> ArrayView<'a, T> {
    /// Create a view over a borrowed slice.
    pub fn new(data: &'a [T], name: &'static str) -> Self {
        Self { data, name }
    }

    /// Create a view from a host array description.
    ///
    /// The description must be one-dimensional with unit stride; the view
    /// covers the first `dims[0]` elements of `data`.
    pub fn from_strided(
        data: &'a [T],
        dims: &[usize],
        strides: &[isize],
        name: &'static str,
    ) -> Result<Self> {
        let len = validate_contiguous(name, data.len(), dims, strides)?;
        Ok(Self {
            data: &data[..len],
            name,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'a, T> {
        self.data.iter()
    }

    /// Checked element access.
    pub fn get(&self, index: usize) -> Result<&'a T> {
        ensure_cmp!(BoundsViolation, self.name, index, <, self.data.len());
        Ok(&self.data[index])
    }

    /// Sub-view over `[start, stop)`.
    pub fn slice(&self, start: usize, stop: usize) -> Result<Self> {
        let range = validate_range(self.name, self.data.len(), start, stop)?;
        Ok(Self {
            data: &self.data[range],
            name: self.name,
        })
    }

    /// Split into `[0, at)` and `[at, len)`.
    pub fn split(&self, at: usize) -> Result<(Self, Self)> {
        ensure_cmp!(BoundsViolation, self.name, at, <=, self.data.len());
        let (left, right) = self.data.split_at(at);
        Ok((
            Self {
                data: left,
                name: self.name,
            },
            Self {
                data: right,
                name: self.name,
            },
        ))
    }
}

impl<T> Index<usize> for ArrayView<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        debug_assert!(
            index < self.data.len(),
            "{}: index {} out of bounds for length {}",
            self.name,
            index,
            self.data.len()
        );
        &self.data[index]
    }
}

// ============================================================================
// ArrayViewMut
// ============================================================================

/// Mutable bounds-checked window over a contiguous buffer.
///
/// Operations that produce a sub-window either reborrow (`slice_mut`) or
/// consume the view (`into_slice`, `split`) so mutable windows never alias.
pub struct ArrayViewMut<'a, T> {
    data: &'a mut [T],
    name: &'static str,
}

impl<T: std::fmt::Debug> std::fmt::Debug for ArrayViewMut<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayViewMut")
            .field("name", &self.name)
            .field("data", &self.data)
            .finish()
    }
}

impl<'a, T> ArrayViewMut<'a, T> {
    pub fn new(data: &'a mut [T], name: &'static str) -> Self {
        Self { data, name }
    }

    /// Create a mutable view from a host array description.
    pub fn from_strided(
        data: &'a mut [T],
        dims: &[usize],
        strides: &[isize],
        name: &'static str,
    ) -> Result<Self> {
        let len = validate_contiguous(name, data.len(), dims, strides)?;
        Ok(Self {
            data: &mut data[..len],
            name,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.data
    }

    /// Consume the view, yielding the underlying slice for its full lifetime.
    #[inline]
    pub fn into_slice(self) -> &'a mut [T] {
        self.data
    }

    /// Reborrow as an immutable view.
    #[inline]
    pub fn as_view(&self) -> ArrayView<'_, T> {
        ArrayView {
            data: self.data,
            name: self.name,
        }
    }

    /// Reborrow as a shorter-lived mutable view.
    #[inline]
    pub fn reborrow(&mut self) -> ArrayViewMut<'_, T> {
        ArrayViewMut {
            data: self.data,
            name: self.name,
        }
    }

    /// Mutable sub-view over `[start, stop)`, borrowing `self`.
    pub fn slice_mut(&mut self, start: usize, stop: usize) -> Result<ArrayViewMut<'_, T>> {
        let range = validate_range(self.name, self.data.len(), start, stop)?;
        Ok(ArrayViewMut {
            data: &mut self.data[range],
            name: self.name,
        })
    }

    /// Split into `[0, at)` and `[at, len)`, consuming the view.
    pub fn split(self, at: usize) -> Result<(Self, Self)> {
        ensure_cmp!(BoundsViolation, self.name, at, <=, self.data.len());
        let name = self.name;
        let (left, right) = self.data.split_at_mut(at);
        Ok((Self { data: left, name }, Self { data: right, name }))
    }
}

impl<T: Copy> ArrayViewMut<'_, T> {
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Copy `source` into this view; lengths must agree.
    pub fn copy_from(&mut self, source: &ArrayView<'_, T>) -> Result<()> {
        ensure_cmp!(SizeMismatch, self.name, self.data.len(), ==, source.len());
        self.data.copy_from_slice(source.as_slice());
        Ok(())
    }
}

impl<'a, T> From<ArrayViewMut<'a, T>> for ArrayView<'a, T> {
    fn from(view: ArrayViewMut<'a, T>) -> Self {
        ArrayView {
            data: view.data,
            name: view.name,
        }
    }
}

impl<T> Index<usize> for ArrayViewMut<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        debug_assert!(
            index < self.data.len(),
            "{}: index {} out of bounds for length {}",
            self.name,
            index,
            self.data.len()
        );
        &self.data[index]
    }
}

impl<T> IndexMut<usize> for ArrayViewMut<'_, T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(
            index < self.data.len(),
            "{}: index {} out of bounds for length {}",
            self.name,
            index,
            self.data.len()
        );
        &mut self.data[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KernelError;

    #[test]
    fn test_slice_and_split() {
        let data = [1, 2, 3, 4, 5];
        let view = ArrayView::new(&data, "data");
        let middle = view.slice(1, 4).unwrap();
        assert_eq!(middle.as_slice(), &[2, 3, 4]);
        let (left, right) = middle.split(1).unwrap();
        assert_eq!(left.as_slice(), &[2]);
        assert_eq!(right.as_slice(), &[3, 4]);
        assert_eq!(right.name(), "data");
    }

    #[test]
    fn test_slice_rejects_reversed_range() {
        let data = [1, 2, 3];
        let view = ArrayView::new(&data, "data");
        assert!(matches!(
            view.slice(2, 1),
            Err(KernelError::OrderViolation(_))
        ));
        assert!(matches!(
            view.slice(1, 4),
            Err(KernelError::BoundsViolation(_))
        ));
    }

    #[test]
    fn test_get_out_of_bounds() {
        let data = [1.0f32];
        let view = ArrayView::new(&data, "weights");
        assert_eq!(*view.get(0).unwrap(), 1.0);
        let err = view.get(1).unwrap_err();
        assert_eq!(err.violation().what, "weights");
    }

    #[test]
    fn test_from_strided_requires_contiguous_1d() {
        let data = [0u8; 6];
        assert_eq!(
            ArrayView::from_strided(&data, &[4], &[1], "a").unwrap().len(),
            4
        );
        assert!(matches!(
            ArrayView::from_strided(&data, &[3], &[2], "a"),
            Err(KernelError::ShapeMismatch(_))
        ));
        assert!(matches!(
            ArrayView::from_strided(&data, &[2, 3], &[3, 1], "a"),
            Err(KernelError::ShapeMismatch(_))
        ));
        assert!(matches!(
            ArrayView::from_strided(&data, &[7], &[1], "a"),
            Err(KernelError::SizeMismatch(_))
        ));
    }

    #[test]
    fn test_mut_split_and_convert() {
        let mut data = [0i64; 4];
        let view = ArrayViewMut::new(&mut data, "out");
        let (mut left, mut right) = view.split(2).unwrap();
        left.fill(1);
        right[1] = 7;
        let frozen: ArrayView<'_, i64> = right.into();
        assert_eq!(frozen.as_slice(), &[0, 7]);
        assert_eq!(data, [1, 1, 0, 7]);
    }

    #[test]
    fn test_copy_from_checks_length() {
        let source = [1u32, 2, 3];
        let mut target = [0u32; 2];
        let mut view = ArrayViewMut::new(&mut target, "target");
        assert!(matches!(
            view.copy_from(&ArrayView::new(&source, "source")),
            Err(KernelError::SizeMismatch(_))
        ));
        view.copy_from(&ArrayView::new(&source[1..], "source"))
            .unwrap();
        assert_eq!(target, [2, 3]);
    }
}
