//! Per-row and per-band numeric kernels for metacell analysis.
//!
//! Every kernel reads and writes caller-owned buffers through the views of
//! `metacells-view`, validates shapes before touching any output, and then
//! runs one independent unit of work per row or band through the
//! [`for_each_unit`] harness.
//!
//! # Kernels
//!
//! - [`downsample_array`] / [`downsample_matrix`] / [`downsample_compressed`]:
//!   weighted sampling of units without replacement
//! - [`relayout_indptr`] / [`relayout_scatter`] / [`relayout_compressed`]:
//!   CSR <-> CSC conversion, and [`sort_band_indices`] to restore index order
//! - [`collect_outgoing`] / [`collect_pruned`]: K-nearest-neighbor graph
//!   edges and their pruning
//! - [`rank_matrix`]: per-row order statistic
//! - [`shuffle_matrix`] / [`shuffle_compressed`]: per-row random permutation
//! - [`fold_factor_dense`] / [`fold_factor_compressed`]: clipped log2 fold
//!   factors, and [`top_distinct`] to pick the most extreme per row
//!
//! # Execution
//!
//! With the `parallel` feature (default), [`ExecutionMode::Parallel`] spreads
//! units over rayon's global pool. [`ExecutionMode::Sequential`] runs them on
//! the calling thread, for callers that are already parallel themselves.
//!
//! # Example
//!
//! ```
//! use metacells_kernel::{rank_matrix, ExecutionMode};
//! use metacells_view::{ArrayViewMut, MatrixView};
//!
//! let input = [5, 1, 3, 9, 9, 9];
//! let mut output = [0; 2];
//! rank_matrix(
//!     ExecutionMode::Parallel,
//!     MatrixView::row_major(&input, 2, 3, "input").unwrap(),
//!     ArrayViewMut::new(&mut output, "output"),
//!     1,
//! )
//! .unwrap();
//! assert_eq!(output, [3, 9]);
//! ```

pub mod distinct;
pub mod downsample;
pub mod fold;
pub mod maybe_sync;
pub mod neighbors;
pub mod rank;
pub mod relayout;
mod scratch;
pub mod shuffle;
pub mod threading;

pub use distinct::top_distinct;
pub use downsample::{
    downsample_array, downsample_compressed, downsample_matrix, sampling_tree_size, SamplingTree,
};
pub use fold::{fold_factor, fold_factor_compressed, fold_factor_dense};
pub use maybe_sync::{MaybeSend, MaybeSync};
pub use neighbors::{collect_outgoing, collect_pruned};
pub use rank::rank_matrix;
pub use relayout::{relayout_compressed, relayout_indptr, relayout_scatter, sort_band_indices};
pub use shuffle::{shuffle_compressed, shuffle_matrix};
pub use threading::{for_each_unit, unit_seed, ExecutionMode, MIN_PARALLEL_UNITS, SEED_STRIDE};

pub use metacells_traits::{DataElement, IndexElement};
pub use metacells_view::{KernelError, Result};
