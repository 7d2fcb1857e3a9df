//! Numeric kernels of metacell analysis, ready for embedding.
//!
//! This crate is the facade of the workspace. It re-exports the views of
//! `metacells-view` and the kernels of `metacells-kernel`, and adds what a
//! host runtime needs to call them:
//!
//! - [`set_external_parallel_mode`]: process-wide switch for callers that
//!   already run the kernels from several workers
//! - [`Boundary`]: one entry point per kernel taking raw buffers, releasing
//!   the host lock ([`HostLock`]) during the call and treating any contract
//!   violation as fatal
//! - [`logging`]: `tracing` subscriber setup honoring `RUST_LOG`
//!
//! Library users who want recoverable errors call the kernels directly with
//! an explicit [`ExecutionMode`]; every kernel returns a [`Result`].
//!
//! # Example
//!
//! ```rust
//! use metacells_rs::{Boundary, HostMatrix};
//!
//! let input = [5u32, 1, 3, 9, 9, 9];
//! let mut output = [0u32; 2];
//! Boundary::new().rank_matrix(HostMatrix::new(&input, &[2, 3], &[3, 1]), &mut output, 1);
//! assert_eq!(output, [3, 9]);
//! ```
//!
//! # Downsampling Example
//!
//! ```rust
//! use metacells_rs::{downsample_array, ArrayView, ArrayViewMut};
//!
//! // Totals at most `samples` pass through unchanged.
//! let input = [2.0f32, 0.0, 5.0];
//! let mut output = [0.0f32; 3];
//! downsample_array(
//!     ArrayView::new(&input, "input"),
//!     ArrayViewMut::new(&mut output, "output"),
//!     10,
//!     123,
//! )
//! .unwrap();
//! assert_eq!(output, input);
//! ```

pub mod boundary;
pub mod host;
pub mod logging;

pub use boundary::{
    execution_mode, external_parallel_mode, set_external_parallel_mode, Boundary, HostMatrix,
    HostMatrixMut,
};
pub use host::{HostLock, NoHostLock, Released};

pub use metacells_kernel::*;
pub use metacells_view::{
    validate_indptr, ArrayView, ArrayViewMut, CompressedView, CompressedViewMut, Disjoint,
    DisjointBands, DisjointRows, MatrixView, MatrixViewMut, Violation,
};
