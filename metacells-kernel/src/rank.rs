//! Per-row order statistics.

use metacells_view::{ensure_cmp, ArrayViewMut, DataElement, Disjoint, MatrixView, Result};

use crate::scratch::{identity_positions, with_scratch};
use crate::threading::{for_each_unit, ExecutionMode};

fn rank_row<D: DataElement>(row: &[D], rank: usize) -> D {
    with_scratch(|scratch| {
        let positions = &mut scratch.positions;
        identity_positions(positions, row.len());
        let (_, &mut position, _) =
            positions.select_nth_unstable_by(rank, |&left, &right| row[left].order(row[right]));
        row[position]
    })
}

/// Write to `output[row]` the value at 0-based position `rank` of the row
/// sorted in ascending order.
pub fn rank_matrix<D: DataElement>(
    mode: ExecutionMode,
    input: MatrixView<'_, D>,
    output: ArrayViewMut<'_, D>,
    rank: usize,
) -> Result<()> {
    ensure_cmp!(SizeMismatch, output.name(), output.len(), ==, input.rows());
    ensure_cmp!(DomainViolation, "rank", rank, <, input.columns());

    let output = Disjoint::new(output);
    for_each_unit(mode, input.rows(), |row| {
        let value = rank_row(input.get_row(row)?.as_slice(), rank);
        // SAFETY: each unit writes only its own row's slot.
        unsafe { output.write(row, value) }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use metacells_view::KernelError;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_rank_small() {
        let input = [5, 1, 3, 9, 9, 9];
        let mut output = [0; 2];
        rank_matrix(
            ExecutionMode::Sequential,
            MatrixView::row_major(&input, 2, 3, "input").unwrap(),
            ArrayViewMut::new(&mut output, "output"),
            1,
        )
        .unwrap();
        assert_eq!(output, [3, 9]);
    }

    #[test]
    fn test_rank_matches_sorted_rows() {
        let mut rng = StdRng::seed_from_u64(9);
        let (rows, columns) = (20, 33);
        let input: Vec<f64> = (0..rows * columns).map(|_| rng.random_range(-5.0..5.0)).collect();
        for rank in [0, 16, 32] {
            let mut output = vec![0.0; rows];
            rank_matrix(
                ExecutionMode::Parallel,
                MatrixView::row_major(&input, rows, columns, "input").unwrap(),
                ArrayViewMut::new(&mut output, "output"),
                rank,
            )
            .unwrap();
            for (row, &value) in input.chunks(columns).zip(&output) {
                let mut sorted = row.to_vec();
                sorted.sort_by(f64::total_cmp);
                assert_eq!(value, sorted[rank]);
            }
        }
    }

    #[test]
    fn test_rank_domain() {
        let input = [1.0f32, 2.0];
        let mut output = [0.0f32; 1];
        let result = rank_matrix(
            ExecutionMode::Sequential,
            MatrixView::row_major(&input, 1, 2, "input").unwrap(),
            ArrayViewMut::new(&mut output, "output"),
            2,
        );
        assert!(matches!(result, Err(KernelError::DomainViolation(_))));
    }
}
