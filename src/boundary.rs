//! Entry points for embedding the kernels in a host runtime.
//!
//! The boundary takes raw caller-owned buffers, builds the views, releases the
//! host lock for the duration of the call and runs the kernel in the
//! [`ExecutionMode`] selected by the process-wide external-parallel flag.
//!
//! Any [`KernelError`] is fatal here: it is logged at `error` level and the
//! call panics with the diagnostic. Builds with `panic = "abort"` turn that
//! into a process abort, so no partial result ever reaches the host.

use std::sync::atomic::{AtomicBool, Ordering};

use metacells_kernel::{self as kernel, ExecutionMode};
use metacells_view::{
    ArrayView, ArrayViewMut, CompressedView, CompressedViewMut, DataElement, IndexElement,
    KernelError, MatrixView, MatrixViewMut, Result,
};
use tracing::field::{debug, Empty};
use tracing::{debug_span, Span};

use crate::host::{HostLock, NoHostLock, Released};

static EXTERNAL_PARALLEL: AtomicBool = AtomicBool::new(false);

/// Tell the kernels whether the caller already runs them from several
/// independent workers. While set, kernels never fan out internally.
pub fn set_external_parallel_mode(enabled: bool) {
    EXTERNAL_PARALLEL.store(enabled, Ordering::Relaxed);
}

/// Current value of the external-parallel flag.
pub fn external_parallel_mode() -> bool {
    EXTERNAL_PARALLEL.load(Ordering::Relaxed)
}

/// Execution mode derived from the external-parallel flag.
pub fn execution_mode() -> ExecutionMode {
    ExecutionMode::for_external_parallelism(external_parallel_mode())
}

/// Read-only dense 2-D host array: buffer, dims and strides in elements.
pub struct HostMatrix<'a, T> {
    pub data: &'a [T],
    pub dims: &'a [usize],
    pub strides: &'a [isize],
}

impl<'a, T> HostMatrix<'a, T> {
    pub fn new(data: &'a [T], dims: &'a [usize], strides: &'a [isize]) -> Self {
        Self {
            data,
            dims,
            strides,
        }
    }

    fn view(&self, name: &'static str) -> Result<MatrixView<'a, T>> {
        MatrixView::from_strided(self.data, self.dims, self.strides, name)
    }
}

/// Writable dense 2-D host array: buffer, dims and strides in elements.
pub struct HostMatrixMut<'a, T> {
    pub data: &'a mut [T],
    pub dims: &'a [usize],
    pub strides: &'a [isize],
}

impl<'a, T> HostMatrixMut<'a, T> {
    pub fn new(data: &'a mut [T], dims: &'a [usize], strides: &'a [isize]) -> Self {
        Self {
            data,
            dims,
            strides,
        }
    }

    fn view(self, name: &'static str) -> Result<MatrixViewMut<'a, T>> {
        MatrixViewMut::from_strided(self.data, self.dims, self.strides, name)
    }
}

#[cold]
#[inline(never)]
fn fatal(error: KernelError) -> ! {
    let violation = error.violation();
    tracing::error!(
        file = violation.file,
        line = violation.line,
        what = violation.what,
        check = violation.check,
        left = violation.left,
        right = violation.right,
        "{error}"
    );
    panic!("{error}");
}

/// Kernel entry points guarded by a host lock.
#[derive(Debug, Default)]
pub struct Boundary<H: HostLock = NoHostLock> {
    host: H,
}

impl Boundary {
    /// Boundary for hosts without a global lock.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H: HostLock> Boundary<H> {
    pub fn with_host(host: H) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Run `kernel` inside `span` with the host lock released.
    ///
    /// `span` must declare an empty `mode` field.
    fn run<T>(&self, span: Span, kernel: impl FnOnce(ExecutionMode) -> Result<T>) -> T {
        let mode = execution_mode();
        span.record("mode", debug(mode));
        let _entered = span.enter();
        let outcome = {
            let _released = Released::new(&self.host);
            kernel(mode)
        };
        outcome.unwrap_or_else(|error| fatal(error))
    }

    pub fn downsample_array<D: DataElement, O: DataElement>(
        &self,
        input: &[D],
        output: &mut [O],
        samples: u64,
        seed: u64,
    ) {
        let span = debug_span!("downsample_array", len = input.len(), samples, seed, mode = Empty);
        self.run(span, |_| {
            kernel::downsample_array(
                ArrayView::new(input, "input"),
                ArrayViewMut::new(output, "output"),
                samples,
                seed,
            )
        })
    }

    pub fn downsample_matrix<D: DataElement, O: DataElement>(
        &self,
        input: HostMatrix<'_, D>,
        output: HostMatrixMut<'_, O>,
        samples: u64,
        seed: u64,
    ) {
        let span = debug_span!("downsample_matrix", dims = ?input.dims, samples, seed, mode = Empty);
        self.run(span, |mode| {
            kernel::downsample_matrix(
                mode,
                input.view("input")?,
                output.view("output")?,
                samples,
                seed,
            )
        })
    }

    pub fn downsample_compressed<D: DataElement, P: IndexElement, O: DataElement>(
        &self,
        data: &[D],
        indptr: &[P],
        output: &mut [O],
        samples: u64,
        seed: u64,
    ) {
        let span = debug_span!(
            "downsample_compressed",
            bands = indptr.len().saturating_sub(1),
            nnz = data.len(),
            samples,
            seed,
            mode = Empty
        );
        self.run(span, |mode| {
            kernel::downsample_compressed(
                mode,
                ArrayView::new(data, "data"),
                ArrayView::new(indptr, "indptr"),
                ArrayViewMut::new(output, "output"),
                samples,
                seed,
            )
        })
    }

    /// Scatter into the other orientation, given precomputed output offsets.
    ///
    /// The input has one element per output band.
    pub fn relayout_scatter<D: DataElement, I: IndexElement, P: IndexElement>(
        &self,
        input_data: &[D],
        input_indices: &[I],
        input_indptr: &[P],
        output_data: &mut [D],
        output_indices: &mut [I],
        output_indptr: &[P],
    ) {
        let elements_count = output_indptr.len().saturating_sub(1);
        let span = debug_span!(
            "relayout_scatter",
            input_bands = input_indptr.len().saturating_sub(1),
            output_bands = elements_count,
            nnz = input_data.len(),
            mode = Empty
        );
        self.run(span, |mode| {
            let input = CompressedView::new(
                ArrayView::new(input_data, "input_data"),
                ArrayView::new(input_indices, "input_indices"),
                ArrayView::new(input_indptr, "input_indptr"),
                elements_count,
                "input",
            )?;
            kernel::relayout_scatter(
                mode,
                input,
                ArrayViewMut::new(output_data, "output_data"),
                ArrayViewMut::new(output_indices, "output_indices"),
                ArrayView::new(output_indptr, "output_indptr"),
            )
        })
    }

    /// Full relayout: output offsets, scatter and band sort.
    #[allow(clippy::too_many_arguments)]
    pub fn relayout_compressed<D: DataElement, I: IndexElement, P: IndexElement>(
        &self,
        input_data: &[D],
        input_indices: &[I],
        input_indptr: &[P],
        elements_count: usize,
        output_data: &mut [D],
        output_indices: &mut [I],
        output_indptr: &mut [P],
    ) {
        let span = debug_span!(
            "relayout_compressed",
            input_bands = input_indptr.len().saturating_sub(1),
            elements_count,
            nnz = input_data.len(),
            mode = Empty
        );
        self.run(span, |mode| {
            let input = CompressedView::new(
                ArrayView::new(input_data, "input_data"),
                ArrayView::new(input_indices, "input_indices"),
                ArrayView::new(input_indptr, "input_indptr"),
                elements_count,
                "input",
            )?;
            kernel::relayout_compressed(
                mode,
                input,
                ArrayViewMut::new(output_data, "output_data"),
                ArrayViewMut::new(output_indices, "output_indices"),
                ArrayViewMut::new(output_indptr, "output_indptr"),
            )
        })
    }

    pub fn sort_band_indices<D: DataElement, I: IndexElement, P: IndexElement>(
        &self,
        data: &mut [D],
        indices: &mut [I],
        indptr: &[P],
        elements_count: usize,
    ) {
        let span = debug_span!(
            "sort_band_indices",
            bands = indptr.len().saturating_sub(1),
            elements_count,
            mode = Empty
        );
        self.run(span, |mode| {
            let matrix = CompressedViewMut::new(
                ArrayViewMut::new(data, "data"),
                ArrayViewMut::new(indices, "indices"),
                ArrayView::new(indptr, "indptr"),
                elements_count,
                "matrix",
            )?;
            kernel::sort_band_indices(mode, matrix)
        })
    }

    pub fn shuffle_matrix<D: DataElement>(&self, matrix: HostMatrixMut<'_, D>, seed: u64) {
        let span = debug_span!("shuffle_matrix", dims = ?matrix.dims, seed, mode = Empty);
        self.run(span, |mode| kernel::shuffle_matrix(mode, matrix.view("matrix")?, seed))
    }

    pub fn shuffle_compressed<D: DataElement, I: IndexElement, P: IndexElement>(
        &self,
        data: &mut [D],
        indices: &mut [I],
        indptr: &[P],
        elements_count: usize,
        seed: u64,
    ) {
        let span = debug_span!(
            "shuffle_compressed",
            bands = indptr.len().saturating_sub(1),
            elements_count,
            seed,
            mode = Empty
        );
        self.run(span, |mode| {
            let matrix = CompressedViewMut::new(
                ArrayViewMut::new(data, "data"),
                ArrayViewMut::new(indices, "indices"),
                ArrayView::new(indptr, "indptr"),
                elements_count,
                "matrix",
            )?;
            kernel::shuffle_compressed(mode, matrix, seed)
        })
    }

    pub fn rank_matrix<D: DataElement>(&self, input: HostMatrix<'_, D>, output: &mut [D], rank: usize) {
        let span = debug_span!("rank_matrix", dims = ?input.dims, rank, mode = Empty);
        self.run(span, |mode| {
            kernel::rank_matrix(
                mode,
                input.view("input")?,
                ArrayViewMut::new(output, "output"),
                rank,
            )
        })
    }

    pub fn fold_factor_dense<D: DataElement>(
        &self,
        data: HostMatrixMut<'_, D>,
        min_gene_fold_factor: f64,
        row_totals: &[D],
        column_fractions: &[D],
    ) {
        let span = debug_span!("fold_factor_dense", dims = ?data.dims, min_gene_fold_factor, mode = Empty);
        self.run(span, |mode| {
            kernel::fold_factor_dense(
                mode,
                data.view("data")?,
                min_gene_fold_factor,
                ArrayView::new(row_totals, "row_totals"),
                ArrayView::new(column_fractions, "column_fractions"),
            )
        })
    }

    /// Fold factors of a compressed matrix whose elements are described by
    /// `element_fractions`.
    pub fn fold_factor_compressed<D: DataElement, I: IndexElement, P: IndexElement>(
        &self,
        data: &mut [D],
        indices: &mut [I],
        indptr: &[P],
        min_gene_fold_factor: f64,
        band_totals: &[D],
        element_fractions: &[D],
    ) {
        let span = debug_span!(
            "fold_factor_compressed",
            bands = indptr.len().saturating_sub(1),
            elements_count = element_fractions.len(),
            min_gene_fold_factor,
            mode = Empty
        );
        self.run(span, |mode| {
            let matrix = CompressedViewMut::new(
                ArrayViewMut::new(data, "data"),
                ArrayViewMut::new(indices, "indices"),
                ArrayView::new(indptr, "indptr"),
                element_fractions.len(),
                "data",
            )?;
            kernel::fold_factor_compressed(
                mode,
                matrix,
                min_gene_fold_factor,
                ArrayView::new(band_totals, "band_totals"),
                ArrayView::new(element_fractions, "element_fractions"),
            )
        })
    }

    pub fn collect_outgoing<S: DataElement, I: IndexElement, R: DataElement>(
        &self,
        degree: usize,
        similarity: HostMatrix<'_, S>,
        output_indices: &mut [I],
        output_ranks: &mut [R],
    ) {
        let span = debug_span!("collect_outgoing", dims = ?similarity.dims, degree, mode = Empty);
        self.run(span, |mode| {
            kernel::collect_outgoing(
                mode,
                degree,
                similarity.view("similarity")?,
                ArrayViewMut::new(output_indices, "output_indices"),
                ArrayViewMut::new(output_ranks, "output_ranks"),
            )
        })
    }

    /// Prune a square ranks graph, stored with one band per node.
    #[allow(clippy::too_many_arguments)]
    pub fn collect_pruned<D: DataElement, I: IndexElement, P: IndexElement>(
        &self,
        pruned_degree: usize,
        input_ranks_data: &[D],
        input_ranks_indices: &[I],
        input_ranks_indptr: &[P],
        output_data: &mut [D],
        output_indices: &mut [I],
        output_indptr: &mut [P],
    ) {
        let size = input_ranks_indptr.len().saturating_sub(1);
        let span = debug_span!(
            "collect_pruned",
            size,
            nnz = input_ranks_data.len(),
            pruned_degree,
            mode = Empty
        );
        self.run(span, |mode| {
            let input = CompressedView::new(
                ArrayView::new(input_ranks_data, "input_ranks_data"),
                ArrayView::new(input_ranks_indices, "input_ranks_indices"),
                ArrayView::new(input_ranks_indptr, "input_ranks_indptr"),
                size,
                "input_ranks",
            )?;
            kernel::collect_pruned(
                mode,
                pruned_degree,
                input,
                ArrayViewMut::new(output_data, "output_data"),
                ArrayViewMut::new(output_indices, "output_indices"),
                ArrayViewMut::new(output_indptr, "output_indptr"),
            )
        })
    }

    pub fn top_distinct<I: IndexElement, D: DataElement, F: DataElement>(
        &self,
        output_indices: HostMatrixMut<'_, I>,
        output_folds: HostMatrixMut<'_, D>,
        fold_matrix: HostMatrix<'_, F>,
        consider_low_folds: bool,
    ) {
        let span = debug_span!(
            "top_distinct",
            dims = ?fold_matrix.dims,
            distinct = output_indices.dims.get(1).copied().unwrap_or(0),
            consider_low_folds,
            mode = Empty
        );
        self.run(span, |mode| {
            kernel::top_distinct(
                mode,
                output_indices.view("output_indices")?,
                output_folds.view("output_folds")?,
                fold_matrix.view("fold_matrix")?,
                consider_low_folds,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_selects_mode() {
        set_external_parallel_mode(true);
        assert!(external_parallel_mode());
        assert_eq!(execution_mode(), ExecutionMode::Sequential);
        set_external_parallel_mode(false);
        assert_eq!(execution_mode(), ExecutionMode::Parallel);
    }

    #[test]
    fn test_host_matrix_rejects_non_2d() {
        let data = [1.0f32; 4];
        let matrix = HostMatrix::new(&data, &[4], &[1]);
        assert!(matches!(matrix.view("m"), Err(KernelError::ShapeMismatch(_))));
    }
}
