//! Compressed-matrix relayout (CSR <-> CSC) and band sorting.
//!
//! The scatter moves every stored entry `(band, index, value)` to destination
//! band `index`, where it becomes `(index, band, value)`. Slots inside a
//! destination band are handed out by a write cursor per destination band,
//! held in a buffer separate from the caller's offsets. When bands are
//! scattered concurrently the cursors are atomic and the order within a
//! destination band is arbitrary, so a [`sort_band_indices`] pass restores
//! ascending index order afterwards.

use std::sync::atomic::{AtomicUsize, Ordering};

use metacells_view::{
    ensure_cmp, validate_indptr, ArrayView, ArrayViewMut, CompressedView, CompressedViewMut,
    DataElement, Disjoint, IndexElement, Result,
};

use crate::scratch::{identity_positions, with_scratch};
use crate::threading::{for_each_unit, ExecutionMode};

const VISITED: usize = usize::MAX;

/// Compute the offsets of the relayout of a matrix whose indices are
/// `input_indices`.
///
/// `output_indptr` has one entry per destination band plus one; it is
/// overwritten with the prefix sum of the number of entries targeting each
/// destination band.
pub fn relayout_indptr<I: IndexElement, P: IndexElement>(
    input_indices: ArrayView<'_, I>,
    mut output_indptr: ArrayViewMut<'_, P>,
) -> Result<()> {
    ensure_cmp!(SizeMismatch, output_indptr.name(), output_indptr.len(), >=, 1);
    let bands = output_indptr.len() - 1;
    for &index in input_indices.iter() {
        ensure_cmp!(BoundsViolation, input_indices.name(), index.as_position(), <, bands);
    }

    let offsets = output_indptr.as_mut_slice();
    offsets.fill(P::zero());
    for &index in input_indices.iter() {
        let band = index.as_position();
        offsets[band + 1] = offsets[band + 1] + P::one();
    }

    let mut total = 0;
    for offset in offsets.iter_mut() {
        total += offset.as_position();
        *offset = P::from_position(total);
    }
    Ok(())
}

/// Scatter the entries of source band `band` through `next_slot`.
fn scatter_band<D: DataElement, I: IndexElement, P: IndexElement>(
    input: &CompressedView<'_, D, I, P>,
    band: usize,
    data: &Disjoint<'_, D>,
    indices: &Disjoint<'_, I>,
    output_indptr: ArrayView<'_, P>,
    mut next_slot: impl FnMut(usize) -> usize,
) -> Result<()> {
    let (band_data, band_indices) = input.band(band)?;
    let output_bands = output_indptr.len() - 1;
    let source = I::from_position(band);

    for (&value, &index) in band_data.iter().zip(band_indices.iter()) {
        let target = index.as_position();
        ensure_cmp!(BoundsViolation, band_indices.name(), target, <, output_bands);
        let slot = next_slot(target);
        // a cursor running past its band means the offsets undercount it
        ensure_cmp!(
            BoundsViolation,
            output_indptr.name(),
            slot,
            <,
            output_indptr[target + 1].as_position()
        );
        // SAFETY: cursors hand out every slot at most once.
        unsafe {
            data.write(slot, value)?;
            indices.write(slot, source)?;
        }
    }
    Ok(())
}

/// Every cursor must have reached the end of its band.
fn check_filled<P: IndexElement>(
    output_indptr: ArrayView<'_, P>,
    cursors: impl Iterator<Item = usize>,
) -> Result<()> {
    for (band, cursor) in cursors.enumerate() {
        ensure_cmp!(
            SizeMismatch,
            output_indptr.name(),
            cursor,
            ==,
            output_indptr[band + 1].as_position()
        );
    }
    Ok(())
}

/// Scatter `input` into the other orientation.
///
/// `output_indptr` must already hold the destination offsets (see
/// [`relayout_indptr`]); it is only read. The output has one band per element
/// of `input`, and its indices are the source band indices. Bands of the
/// output are sorted by index only if the scatter ran sequentially.
pub fn relayout_scatter<D: DataElement, I: IndexElement, P: IndexElement>(
    mode: ExecutionMode,
    input: CompressedView<'_, D, I, P>,
    output_data: ArrayViewMut<'_, D>,
    output_indices: ArrayViewMut<'_, I>,
    output_indptr: ArrayView<'_, P>,
) -> Result<()> {
    let nnz = input.data().len();
    ensure_cmp!(SizeMismatch, output_data.name(), output_data.len(), ==, nnz);
    ensure_cmp!(SizeMismatch, output_indices.name(), output_indices.len(), ==, nnz);
    validate_indptr(output_indptr, nnz)?;
    let output_bands = output_indptr.len() - 1;
    ensure_cmp!(SizeMismatch, output_indptr.name(), output_bands, ==, input.elements_count());

    let data = Disjoint::new(output_data);
    let indices = Disjoint::new(output_indices);
    let band_starts = output_indptr.iter().take(output_bands);

    if mode.fans_out(input.bands()) {
        let cursors: Vec<AtomicUsize> = band_starts
            .map(|start| AtomicUsize::new(start.as_position()))
            .collect();
        for_each_unit(mode, input.bands(), |band| {
            scatter_band(&input, band, &data, &indices, output_indptr, |target| {
                cursors[target].fetch_add(1, Ordering::Relaxed)
            })
        })?;
        check_filled(
            output_indptr,
            cursors.iter().map(|cursor| cursor.load(Ordering::Relaxed)),
        )
    } else {
        with_scratch(|scratch| {
            let cursors = &mut scratch.positions;
            cursors.clear();
            cursors.extend(band_starts.map(|start| start.as_position()));
            for band in 0..input.bands() {
                scatter_band(&input, band, &data, &indices, output_indptr, |target| {
                    let slot = cursors[target];
                    cursors[target] += 1;
                    slot
                })?;
            }
            check_filled(output_indptr, cursors.iter().copied())
        })
    }
}

/// Apply the gather permutation `positions` to both buffers in place.
///
/// Afterwards `data[i]` holds what was at `data[positions[i]]`. Consumes
/// `positions`.
fn permute_in_place<D: Copy, I: Copy>(positions: &mut [usize], data: &mut [D], indices: &mut [I]) {
    for start in 0..positions.len() {
        if positions[start] == VISITED {
            continue;
        }
        let first_data = data[start];
        let first_index = indices[start];
        let mut current = start;
        loop {
            let source = positions[current];
            positions[current] = VISITED;
            if source == start {
                data[current] = first_data;
                indices[current] = first_index;
                break;
            }
            data[current] = data[source];
            indices[current] = indices[source];
            current = source;
        }
    }
}

/// Stable-sort one band's entries by ascending index.
pub(crate) fn sort_band<D: Copy, I: IndexElement>(data: &mut [D], indices: &mut [I]) {
    debug_assert_eq!(data.len(), indices.len());
    if indices.windows(2).all(|pair| pair[0] <= pair[1]) {
        return;
    }
    with_scratch(|scratch| {
        let positions = &mut scratch.positions;
        identity_positions(positions, indices.len());
        positions.sort_by_key(|&position| indices[position]);
        permute_in_place(positions, data, indices);
    });
}

/// Sort the entries of every band by ascending index, ties keeping their
/// original order.
pub fn sort_band_indices<D: DataElement, I: IndexElement, P: IndexElement>(
    mode: ExecutionMode,
    mut matrix: CompressedViewMut<'_, D, I, P>,
) -> Result<()> {
    let bands = matrix.share();
    for_each_unit(mode, bands.bands(), |band| {
        // SAFETY: each unit owns exactly one band.
        let (mut data, mut indices) = unsafe { bands.band(band)? };
        sort_band(data.as_mut_slice(), indices.as_mut_slice());
        Ok(())
    })
}

/// Relayout `input` into the other orientation with sorted bands.
///
/// Checks every output size, then computes `output_indptr`, scatters, and
/// sorts every output band.
pub fn relayout_compressed<D: DataElement, I: IndexElement, P: IndexElement>(
    mode: ExecutionMode,
    input: CompressedView<'_, D, I, P>,
    mut output_data: ArrayViewMut<'_, D>,
    mut output_indices: ArrayViewMut<'_, I>,
    mut output_indptr: ArrayViewMut<'_, P>,
) -> Result<()> {
    let nnz = input.data().len();
    ensure_cmp!(SizeMismatch, output_data.name(), output_data.len(), ==, nnz);
    ensure_cmp!(SizeMismatch, output_indices.name(), output_indices.len(), ==, nnz);
    ensure_cmp!(
        SizeMismatch,
        output_indptr.name(),
        output_indptr.len(),
        ==,
        input.elements_count() + 1
    );

    relayout_indptr(input.indices(), output_indptr.reborrow())?;
    let indptr = output_indptr.as_view();
    relayout_scatter(
        mode,
        input,
        output_data.reborrow(),
        output_indices.reborrow(),
        indptr,
    )?;
    let output = CompressedViewMut::new(output_data, output_indices, indptr, input.bands(), "relayout")?;
    sort_band_indices(mode, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use metacells_view::KernelError;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    struct Csr {
        data: Vec<f32>,
        indices: Vec<u32>,
        indptr: Vec<i64>,
        columns: usize,
    }

    impl Csr {
        fn random(rng: &mut StdRng, rows: usize, columns: usize, density: f64) -> Self {
            let mut csr = Csr {
                data: Vec::new(),
                indices: Vec::new(),
                indptr: vec![0],
                columns,
            };
            for _ in 0..rows {
                for column in 0..columns {
                    if rng.random_bool(density) {
                        csr.data.push(rng.random_range(1..100) as f32);
                        csr.indices.push(column as u32);
                    }
                }
                csr.indptr.push(csr.data.len() as i64);
            }
            csr
        }

        fn view(&self) -> CompressedView<'_, f32, u32, i64> {
            CompressedView::new(
                ArrayView::new(&self.data, "data"),
                ArrayView::new(&self.indices, "indices"),
                ArrayView::new(&self.indptr, "indptr"),
                self.columns,
                "csr",
            )
            .unwrap()
        }

        fn relayout(&self, mode: ExecutionMode) -> Csr {
            let mut output = Csr {
                data: vec![0.0; self.data.len()],
                indices: vec![0; self.data.len()],
                indptr: vec![0; self.columns + 1],
                columns: self.indptr.len() - 1,
            };
            relayout_compressed(
                mode,
                self.view(),
                ArrayViewMut::new(&mut output.data, "output_data"),
                ArrayViewMut::new(&mut output.indices, "output_indices"),
                ArrayViewMut::new(&mut output.indptr, "output_indptr"),
            )
            .unwrap();
            output
        }

        fn triples(&self) -> Vec<(usize, u32, f32)> {
            let mut triples = Vec::new();
            for band in 0..self.indptr.len() - 1 {
                for position in self.indptr[band] as usize..self.indptr[band + 1] as usize {
                    triples.push((band, self.indices[position], self.data[position]));
                }
            }
            triples
        }
    }

    #[test]
    fn test_relayout_indptr() {
        let indices = [0u32, 2, 1, 2, 2];
        let mut indptr = [7i32; 5];
        relayout_indptr(
            ArrayView::new(&indices, "indices"),
            ArrayViewMut::new(&mut indptr, "indptr"),
        )
        .unwrap();
        assert_eq!(indptr, [0, 1, 2, 5, 5]);
    }

    #[test]
    fn test_relayout_indptr_rejects_out_of_range_index() {
        let indices = [0u32, 3];
        let mut indptr = [9i32; 4];
        let result = relayout_indptr(
            ArrayView::new(&indices, "indices"),
            ArrayViewMut::new(&mut indptr, "indptr"),
        );
        assert!(matches!(result, Err(KernelError::BoundsViolation(_))));
        assert_eq!(indptr, [9; 4]);
    }

    #[test]
    fn test_relayout_rejects_wrong_sizes_untouched() {
        // [[1, 2]]
        let csr = Csr {
            data: vec![1.0, 2.0],
            indices: vec![0, 1],
            indptr: vec![0, 2],
            columns: 2,
        };

        // data too short
        let mut data = [5.0f32; 1];
        let mut indices = [5u32; 2];
        let mut indptr = [9i64; 3];
        let result = relayout_compressed(
            ExecutionMode::Sequential,
            csr.view(),
            ArrayViewMut::new(&mut data, "output_data"),
            ArrayViewMut::new(&mut indices, "output_indices"),
            ArrayViewMut::new(&mut indptr, "output_indptr"),
        );
        assert!(matches!(result, Err(KernelError::SizeMismatch(_))));
        assert_eq!(indptr, [9; 3]);
        assert_eq!(data, [5.0]);
        assert_eq!(indices, [5; 2]);

        // one output band too many
        let mut data = [5.0f32; 2];
        let mut indptr = [9i64; 4];
        let result = relayout_compressed(
            ExecutionMode::Parallel,
            csr.view(),
            ArrayViewMut::new(&mut data, "output_data"),
            ArrayViewMut::new(&mut indices, "output_indices"),
            ArrayViewMut::new(&mut indptr, "output_indptr"),
        );
        assert!(matches!(result, Err(KernelError::SizeMismatch(_))));
        assert_eq!(indptr, [9; 4]);
        assert_eq!(data, [5.0; 2]);
    }

    #[test]
    fn test_transpose_small() {
        // [[1, 0, 2],
        //  [0, 3, 4]]
        let csr = Csr {
            data: vec![1.0, 2.0, 3.0, 4.0],
            indices: vec![0, 2, 1, 2],
            indptr: vec![0, 2, 4],
            columns: 3,
        };
        for mode in [ExecutionMode::Parallel, ExecutionMode::Sequential] {
            let csc = csr.relayout(mode);
            assert_eq!(csc.indptr, vec![0, 1, 2, 4]);
            assert_eq!(csc.indices, vec![0, 1, 0, 1]);
            assert_eq!(csc.data, vec![1.0, 3.0, 2.0, 4.0]);
        }
    }

    #[test]
    fn test_round_trip() {
        let mut rng = StdRng::seed_from_u64(17);
        for mode in [ExecutionMode::Parallel, ExecutionMode::Sequential] {
            let csr = Csr::random(&mut rng, 40, 25, 0.3);
            let csc = csr.relayout(mode);
            for band in csc.indptr.windows(2) {
                let indices = &csc.indices[band[0] as usize..band[1] as usize];
                assert!(indices.windows(2).all(|pair| pair[0] < pair[1]));
            }
            let back = csc.relayout(mode);
            assert_eq!(back.indptr, csr.indptr);
            assert_eq!(back.triples(), csr.triples());
        }
    }

    #[test]
    fn test_scatter_detects_inconsistent_offsets() {
        let csr = Csr {
            data: vec![1.0, 2.0, 3.0],
            indices: vec![0, 0, 1],
            indptr: vec![0, 2, 3],
            columns: 2,
        };
        // monotonic and complete, but band 0 really holds two entries
        let indptr = [0i64, 1, 3];
        let mut data = [0.0f32; 3];
        let mut indices = [0u32; 3];
        for mode in [ExecutionMode::Parallel, ExecutionMode::Sequential] {
            let result = relayout_scatter(
                mode,
                csr.view(),
                ArrayViewMut::new(&mut data, "output_data"),
                ArrayViewMut::new(&mut indices, "output_indices"),
                ArrayView::new(&indptr, "output_indptr"),
            );
            assert!(matches!(result, Err(KernelError::BoundsViolation(_))));
        }
    }

    #[test]
    fn test_scatter_requires_matching_band_count() {
        let csr = Csr {
            data: vec![1.0],
            indices: vec![0],
            indptr: vec![0, 1],
            columns: 2,
        };
        let indptr = [0i64, 1];
        let mut data = [0.0f32; 1];
        let mut indices = [0u32; 1];
        let result = relayout_scatter(
            ExecutionMode::Sequential,
            csr.view(),
            ArrayViewMut::new(&mut data, "output_data"),
            ArrayViewMut::new(&mut indices, "output_indices"),
            ArrayView::new(&indptr, "output_indptr"),
        );
        assert!(matches!(result, Err(KernelError::SizeMismatch(_))));
    }

    #[test]
    fn test_sort_band_is_stable() {
        let mut data = ['a', 'b', 'c', 'd', 'e'];
        let mut indices = [3u8, 1, 3, 0, 1];
        sort_band(&mut data, &mut indices);
        assert_eq!(indices, [0, 1, 1, 3, 3]);
        assert_eq!(data, ['d', 'b', 'e', 'a', 'c']);
    }

    #[test]
    fn test_sort_band_indices() {
        let mut data = [10i64, 20, 30, 40, 50];
        let mut indices = [2u32, 0, 1, 4, 3];
        let indptr = [0u32, 3, 3, 5];
        let matrix = CompressedViewMut::new(
            ArrayViewMut::new(&mut data, "data"),
            ArrayViewMut::new(&mut indices, "indices"),
            ArrayView::new(&indptr, "indptr"),
            5,
            "matrix",
        )
        .unwrap();
        sort_band_indices(ExecutionMode::Parallel, matrix).unwrap();
        assert_eq!(indices, [0, 1, 2, 3, 4]);
        assert_eq!(data, [20, 30, 10, 50, 40]);
    }

    #[test]
    fn test_permute_in_place() {
        let mut positions = vec![2, 0, 1, 3];
        let mut data = [10, 20, 30, 40];
        let mut indices = [1u8, 2, 3, 4];
        permute_in_place(&mut positions, &mut data, &mut indices);
        assert_eq!(data, [30, 10, 20, 40]);
        assert_eq!(indices, [3, 1, 2, 4]);
    }
}
