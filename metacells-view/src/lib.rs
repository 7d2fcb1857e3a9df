//! Zero-copy views over caller-allocated numeric buffers.
//!
//! Every kernel of the metacells engine operates on memory it does not own:
//! the embedding pipeline allocates all input and output buffers, and the
//! kernels read and write them in place through the views of this crate.
//!
//! # Core Types
//!
//! - [`ArrayView`] / [`ArrayViewMut`]: bounds-checked contiguous 1-D windows
//! - [`MatrixView`] / [`MatrixViewMut`]: row-major 2-D windows with an explicit
//!   row stride, so a view can alias a sub-region of a larger buffer
//! - [`CompressedView`] / [`CompressedViewMut`]: CSR/CSC band-oriented sparse
//!   views made of data, indices and a monotonic offset buffer
//! - [`Disjoint`]: hands out non-overlapping windows of a mutable view to
//!   concurrent workers
//!
//! Views never allocate, grow or shrink the buffers they borrow.

mod array;
mod compressed;
mod disjoint;
mod matrix;

pub use array::{ArrayView, ArrayViewMut};
pub use compressed::{validate_indptr, CompressedView, CompressedViewMut};
pub use disjoint::{Disjoint, DisjointBands, DisjointRows};
pub use matrix::{MatrixView, MatrixViewMut};

pub use metacells_traits::{DataElement, IndexElement};

// ============================================================================
// Error types
// ============================================================================

/// Details of a failed contract check.
///
/// Identifies the source location of the check, the view or argument it
/// guards, the comparison that failed and both operand values.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub file: &'static str,
    pub line: u32,
    pub what: &'static str,
    pub check: &'static str,
    pub left: f64,
    pub right: f64,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {}: failed check: {} ({} vs {})",
            self.file, self.line, self.what, self.check, self.left, self.right
        )
    }
}

/// Contract violations detected by views and kernels.
///
/// None of these is a recoverable runtime condition: the caller is expected to
/// validate its inputs, and the embedding boundary treats any of them as fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KernelError {
    /// Wrong dimensionality or memory layout.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(Box<Violation>),

    /// Lengths or row/column counts that must agree do not.
    #[error("size mismatch: {0}")]
    SizeMismatch(Box<Violation>),

    /// An access outside `[0, size)`.
    #[error("bounds violation: {0}")]
    BoundsViolation(Box<Violation>),

    /// A non-monotonic offset buffer or a slice with `start > stop`.
    #[error("order violation: {0}")]
    OrderViolation(Box<Violation>),

    /// A value outside its required domain.
    #[error("domain violation: {0}")]
    DomainViolation(Box<Violation>),
}

impl KernelError {
    /// The details of the failed check, whatever its kind.
    pub fn violation(&self) -> &Violation {
        match self {
            KernelError::ShapeMismatch(v)
            | KernelError::SizeMismatch(v)
            | KernelError::BoundsViolation(v)
            | KernelError::OrderViolation(v)
            | KernelError::DomainViolation(v) => v,
        }
    }
}

/// Result type for view and kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;

/// Return a [`KernelError`] of the given kind unless `left OP right` holds.
///
/// Operands must be primitive numbers; they are recorded as `f64`.
///
/// ```
/// use metacells_view::{ensure_cmp, KernelError, Result};
///
/// fn check(len: usize) -> Result<()> {
///     ensure_cmp!(SizeMismatch, "output", len, ==, 3);
///     Ok(())
/// }
///
/// assert!(check(3).is_ok());
/// assert!(matches!(check(4), Err(KernelError::SizeMismatch(_))));
/// ```
#[macro_export]
macro_rules! ensure_cmp {
    ($kind:ident, $what:expr, $left:expr, $op:tt, $right:expr) => {{
        let left = $left;
        let right = $right;
        if !(left $op right) {
            return Err($crate::KernelError::$kind(Box::new($crate::Violation {
                file: file!(),
                line: line!(),
                what: $what,
                check: concat!(stringify!($left), " ", stringify!($op), " ", stringify!($right)),
                left: left as f64,
                right: right as f64,
            })));
        }
    }};
}
