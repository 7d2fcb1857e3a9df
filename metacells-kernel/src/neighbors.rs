//! K-nearest-neighbor graph construction and pruning.

use std::cmp::Ordering;

use metacells_view::{
    ensure_cmp, ArrayViewMut, CompressedView, DataElement, Disjoint, DisjointRows, IndexElement,
    MatrixView, Result,
};

use crate::scratch::{identity_positions, with_scratch};
use crate::threading::{for_each_unit, ExecutionMode};

/// Select the `degree` most similar columns of row `row`, excluding `row`.
fn collect_outgoing_row<S: DataElement, I: IndexElement, R: DataElement>(
    row: usize,
    degree: usize,
    similarity: &MatrixView<'_, S>,
    mut row_indices: ArrayViewMut<'_, I>,
    mut row_ranks: ArrayViewMut<'_, R>,
) -> Result<()> {
    let size = similarity.rows();
    let similarities = similarity.get_row(row)?.as_slice();

    with_scratch(|scratch| {
        let positions = &mut scratch.positions;
        positions.clear();
        positions.extend((0..size).filter(|&column| column != row));

        if degree < positions.len() {
            positions.select_nth_unstable_by(degree, |&left, &right| {
                similarities[right].order(similarities[left])
            });
            positions.truncate(degree);
            positions.sort_unstable();
        }
        for (out, &column) in row_indices.as_mut_slice().iter_mut().zip(positions.iter()) {
            *out = I::from_position(column);
        }

        // rank 1 is the least similar of the selected columns
        let selected = row_indices.as_slice();
        identity_positions(positions, degree);
        positions.sort_by(|&left, &right| {
            let left = similarities[selected[left].as_position()];
            let right = similarities[selected[right].as_position()];
            left.order(right)
        });
        let ranks = row_ranks.as_mut_slice();
        for (location, &position) in positions.iter().enumerate() {
            ranks[position] = R::from_count(location as u64 + 1);
        }
        Ok(())
    })
}

/// Build the outgoing edges of a K-nearest-neighbor graph.
///
/// For every row of the square `similarity` matrix, writes to
/// `output_indices[row * degree..][..degree]` the `degree` most similar other
/// columns in ascending order, and to the matching `output_ranks` their rank
/// in `1..=degree`, rank 1 being the least similar of them.
pub fn collect_outgoing<S: DataElement, I: IndexElement, R: DataElement>(
    mode: ExecutionMode,
    degree: usize,
    similarity: MatrixView<'_, S>,
    output_indices: ArrayViewMut<'_, I>,
    output_ranks: ArrayViewMut<'_, R>,
) -> Result<()> {
    let size = similarity.rows();
    ensure_cmp!(ShapeMismatch, similarity.name(), similarity.columns(), ==, size);
    ensure_cmp!(DomainViolation, "degree", degree, >, 0);
    ensure_cmp!(DomainViolation, "degree", degree, <, size);
    ensure_cmp!(SizeMismatch, output_indices.name(), output_indices.len(), ==, degree * size);
    ensure_cmp!(SizeMismatch, output_ranks.name(), output_ranks.len(), ==, degree * size);

    let index_rows = DisjointRows::chunks(output_indices, degree)?;
    let rank_rows = DisjointRows::chunks(output_ranks, degree)?;
    for_each_unit(mode, size, |row| {
        // SAFETY: each unit owns exactly one row of both outputs.
        let (row_indices, row_ranks) = unsafe { (index_rows.row(row)?, rank_rows.row(row)?) };
        collect_outgoing_row(row, degree, &similarity, row_indices, row_ranks)
    })
}

fn prune_band<D: DataElement, I: IndexElement, P: IndexElement>(
    band: usize,
    pruned_degree: usize,
    input: &CompressedView<'_, D, I, P>,
    mut output_data: ArrayViewMut<'_, D>,
    mut output_indices: ArrayViewMut<'_, I>,
) -> Result<()> {
    let (data, indices) = input.band(band)?;
    if data.len() <= pruned_degree {
        output_data.copy_from(&data)?;
        output_indices.copy_from(&indices)?;
        return Ok(());
    }

    let (data, indices) = (data.as_slice(), indices.as_slice());
    with_scratch(|scratch| {
        let positions = &mut scratch.positions;
        identity_positions(positions, data.len());
        positions.select_nth_unstable_by(pruned_degree, |&left, &right| {
            data[right].order(data[left])
        });
        positions.truncate(pruned_degree);
        positions.sort_unstable_by(|&left, &right| match indices[left].cmp(&indices[right]) {
            Ordering::Equal => left.cmp(&right),
            unequal => unequal,
        });

        let (out_data, out_indices) = (output_data.as_mut_slice(), output_indices.as_mut_slice());
        for (location, &position) in positions.iter().enumerate() {
            out_data[location] = data[position];
            out_indices[location] = indices[position];
        }
        Ok(())
    })
}

/// Keep at most `pruned_degree` entries of every band, those of highest value.
///
/// Bands with no more than `pruned_degree` entries are copied unchanged; the
/// kept entries of larger bands are written in ascending index order.
/// The output buffers must hold at least the total kept count. Once that is
/// checked, `output_indptr` (one entry per band plus one) is overwritten with
/// the output offsets before any band is processed.
pub fn collect_pruned<D: DataElement, I: IndexElement, P: IndexElement>(
    mode: ExecutionMode,
    pruned_degree: usize,
    input: CompressedView<'_, D, I, P>,
    output_data: ArrayViewMut<'_, D>,
    output_indices: ArrayViewMut<'_, I>,
    mut output_indptr: ArrayViewMut<'_, P>,
) -> Result<()> {
    let bands = input.bands();
    ensure_cmp!(SizeMismatch, output_indptr.name(), output_indptr.len(), ==, bands + 1);

    let mut kept = 0;
    for band in 0..bands {
        kept += input.band_len(band)?.min(pruned_degree);
    }
    ensure_cmp!(SizeMismatch, output_data.name(), output_data.len(), >=, kept);
    ensure_cmp!(SizeMismatch, output_indices.name(), output_indices.len(), >=, kept);

    let mut offset = 0;
    output_indptr[0] = P::zero();
    for band in 0..bands {
        offset += input.band_len(band)?.min(pruned_degree);
        output_indptr[band + 1] = P::from_position(offset);
    }

    let offsets = output_indptr.as_view();
    let output_data = Disjoint::new(output_data);
    let output_indices = Disjoint::new(output_indices);
    for_each_unit(mode, bands, |band| {
        let start = offsets[band].as_position();
        let stop = offsets[band + 1].as_position();
        // SAFETY: output ranges of distinct bands never overlap.
        let (band_data, band_indices) =
            unsafe { (output_data.window(start, stop)?, output_indices.window(start, stop)?) };
        prune_band(band, pruned_degree, &input, band_data, band_indices)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use metacells_view::{ArrayView, KernelError};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn outgoing(
        mode: ExecutionMode,
        degree: usize,
        similarity: &[f32],
        size: usize,
    ) -> (Vec<i32>, Vec<f32>) {
        let mut indices = vec![0i32; degree * size];
        let mut ranks = vec![0f32; degree * size];
        collect_outgoing(
            mode,
            degree,
            MatrixView::row_major(similarity, size, size, "similarity").unwrap(),
            ArrayViewMut::new(&mut indices, "indices"),
            ArrayViewMut::new(&mut ranks, "ranks"),
        )
        .unwrap();
        (indices, ranks)
    }

    #[test]
    fn test_outgoing_small() {
        #[rustfmt::skip]
        let similarity = [
            1.0, 0.9, 0.1, 0.5,
            0.9, 1.0, 0.2, 0.3,
            0.1, 0.2, 1.0, 0.8,
            0.5, 0.3, 0.8, 1.0f32,
        ];
        let (indices, ranks) = outgoing(ExecutionMode::Sequential, 2, &similarity, 4);
        assert_eq!(indices, vec![1, 3, 0, 3, 1, 3, 0, 2]);
        assert_eq!(ranks, vec![2.0, 1.0, 2.0, 1.0, 1.0, 2.0, 1.0, 2.0]);
    }

    #[test]
    fn test_outgoing_full_degree_takes_all_others() {
        let similarity = [0.0, 3.0, 1.0, 2.0, 0.0, 5.0, 4.0, 6.0, 0.0f64];
        let mut indices = vec![0u32; 6];
        let mut ranks = vec![0u32; 6];
        collect_outgoing(
            ExecutionMode::Parallel,
            2,
            MatrixView::row_major(&similarity, 3, 3, "similarity").unwrap(),
            ArrayViewMut::new(&mut indices, "indices"),
            ArrayViewMut::new(&mut ranks, "ranks"),
        )
        .unwrap();
        assert_eq!(indices, vec![1, 2, 0, 2, 0, 1]);
        assert_eq!(ranks, vec![2, 1, 1, 2, 1, 2]);
    }

    #[test]
    fn test_outgoing_selects_top_degree() {
        let mut rng = StdRng::seed_from_u64(5);
        let size = 30;
        let degree = 7;
        let similarity: Vec<f32> = (0..size * size).map(|_| rng.random::<f32>()).collect();
        for mode in [ExecutionMode::Parallel, ExecutionMode::Sequential] {
            let (indices, ranks) = outgoing(mode, degree, &similarity, size);
            for row in 0..size {
                let row_similarity = &similarity[row * size..(row + 1) * size];
                let selected = &indices[row * degree..(row + 1) * degree];
                let row_ranks = &ranks[row * degree..(row + 1) * degree];

                let mut expected: Vec<usize> = (0..size).filter(|&c| c != row).collect();
                expected.sort_by(|&a, &b| row_similarity[b].total_cmp(&row_similarity[a]));
                expected.truncate(degree);
                expected.sort_unstable();
                let selected: Vec<usize> = selected.iter().map(|&c| c as usize).collect();
                assert_eq!(selected, expected);

                let mut sorted_ranks: Vec<u32> = row_ranks.iter().map(|&r| r as u32).collect();
                sorted_ranks.sort_unstable();
                assert_eq!(sorted_ranks, (1..=degree as u32).collect::<Vec<_>>());
                let lowest = (0..degree)
                    .min_by(|&a, &b| {
                        row_similarity[selected[a]].total_cmp(&row_similarity[selected[b]])
                    })
                    .unwrap();
                assert_eq!(row_ranks[lowest], 1.0);
            }
        }
    }

    #[test]
    fn test_outgoing_rejects_bad_degree() {
        let similarity = [0.0f32; 9];
        let mut indices = vec![0i32; 9];
        let mut ranks = vec![0f32; 9];
        let result = collect_outgoing(
            ExecutionMode::Sequential,
            3,
            MatrixView::row_major(&similarity, 3, 3, "similarity").unwrap(),
            ArrayViewMut::new(&mut indices, "indices"),
            ArrayViewMut::new(&mut ranks, "ranks"),
        );
        assert!(matches!(result, Err(KernelError::DomainViolation(_))));

        let result = collect_outgoing(
            ExecutionMode::Sequential,
            1,
            MatrixView::row_major(&similarity, 3, 3, "similarity").unwrap(),
            ArrayViewMut::new(&mut indices, "indices"),
            ArrayViewMut::new(&mut ranks, "ranks"),
        );
        assert!(matches!(result, Err(KernelError::SizeMismatch(_))));
    }

    #[test]
    fn test_outgoing_requires_square_matrix() {
        let similarity = [0.0f32; 6];
        let mut indices = vec![0i32; 2];
        let mut ranks = vec![0f32; 2];
        let result = collect_outgoing(
            ExecutionMode::Sequential,
            1,
            MatrixView::row_major(&similarity, 2, 3, "similarity").unwrap(),
            ArrayViewMut::new(&mut indices, "indices"),
            ArrayViewMut::new(&mut ranks, "ranks"),
        );
        assert!(matches!(result, Err(KernelError::ShapeMismatch(_))));
    }

    #[test]
    fn test_pruned() {
        let data = [5.0f32, 1.0, 3.0, 4.0, 2.0, 7.0, 8.0];
        let indices = [0i32, 2, 3, 5, 6, 1, 4];
        let indptr = [0i32, 5, 7, 7];
        let input = CompressedView::new(
            ArrayView::new(&data, "data"),
            ArrayView::new(&indices, "indices"),
            ArrayView::new(&indptr, "indptr"),
            7,
            "ranks",
        )
        .unwrap();
        for mode in [ExecutionMode::Parallel, ExecutionMode::Sequential] {
            let mut out_data = [0f32; 9];
            let mut out_indices = [-1i32; 9];
            let mut out_indptr = [9i32; 4];
            collect_pruned(
                mode,
                3,
                input,
                ArrayViewMut::new(&mut out_data, "output_data"),
                ArrayViewMut::new(&mut out_indices, "output_indices"),
                ArrayViewMut::new(&mut out_indptr, "output_indptr"),
            )
            .unwrap();
            assert_eq!(out_indptr, [0, 3, 5, 5]);
            // highest three of band 0 are 5, 4, 3 at indices 0, 5, 3
            assert_eq!(out_indices[..5], [0, 3, 5, 1, 4]);
            assert_eq!(out_data[..5], [5.0, 3.0, 4.0, 7.0, 8.0]);
        }
    }

    #[test]
    fn test_pruned_pass_through_keeps_order() {
        // indices deliberately out of order
        let data = [1u32, 9, 4];
        let indices = [2u32, 0, 1];
        let indptr = [0u64, 3];
        let input = CompressedView::new(
            ArrayView::new(&data, "data"),
            ArrayView::new(&indices, "indices"),
            ArrayView::new(&indptr, "indptr"),
            3,
            "ranks",
        )
        .unwrap();
        let mut out_data = [0u32; 3];
        let mut out_indices = [0u32; 3];
        let mut out_indptr = [0u64; 2];
        collect_pruned(
            ExecutionMode::Parallel,
            3,
            input,
            ArrayViewMut::new(&mut out_data, "output_data"),
            ArrayViewMut::new(&mut out_indices, "output_indices"),
            ArrayViewMut::new(&mut out_indptr, "output_indptr"),
        )
        .unwrap();
        assert_eq!(out_data, data);
        assert_eq!(out_indices, indices);
        assert_eq!(out_indptr, [0, 3]);
    }

    #[test]
    fn test_pruned_requires_room() {
        let data = [1.0f32, 2.0, 3.0];
        let indices = [0i32, 1, 2];
        let indptr = [0i32, 3];
        let input = CompressedView::new(
            ArrayView::new(&data, "data"),
            ArrayView::new(&indices, "indices"),
            ArrayView::new(&indptr, "indptr"),
            3,
            "ranks",
        )
        .unwrap();
        let mut out_data = [0f32; 1];
        let mut out_indices = [0i32; 2];
        let mut out_indptr = [77i32; 2];
        let result = collect_pruned(
            ExecutionMode::Sequential,
            2,
            input,
            ArrayViewMut::new(&mut out_data, "output_data"),
            ArrayViewMut::new(&mut out_indices, "output_indices"),
            ArrayViewMut::new(&mut out_indptr, "output_indptr"),
        );
        assert!(matches!(result, Err(KernelError::SizeMismatch(_))));
        assert_eq!(out_indptr, [77, 77]);
        assert_eq!(out_data, [0.0]);
    }
}
