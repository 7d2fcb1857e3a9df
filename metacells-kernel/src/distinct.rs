//! Per-row selection of the most distinct fold factors.

use std::cmp::Ordering;

use metacells_view::{ensure_cmp, DataElement, IndexElement, MatrixView, MatrixViewMut, Result};

use crate::scratch::{identity_positions, with_scratch};
use crate::threading::{for_each_unit, ExecutionMode};

/// Descending order of `folds[left]` and `folds[right]`, by magnitude when
/// `consider_low_folds` is set.
#[inline]
fn by_fold_descending<F: DataElement>(
    folds: &[F],
    consider_low_folds: bool,
) -> impl Fn(&usize, &usize) -> Ordering + '_ {
    move |&left, &right| {
        if consider_low_folds {
            folds[right].as_f64().abs().total_cmp(&folds[left].as_f64().abs())
        } else {
            folds[right].order(folds[left])
        }
    }
}

/// For every row of `fold_matrix`, write the columns of its
/// `output_indices.columns()` most extreme fold factors, most extreme first,
/// along with the fold factors themselves.
///
/// With `consider_low_folds` the magnitude decides, so strongly negative folds
/// compete with positive ones; otherwise only the highest values are kept.
pub fn top_distinct<I: IndexElement, D: DataElement, F: DataElement>(
    mode: ExecutionMode,
    mut output_indices: MatrixViewMut<'_, I>,
    mut output_folds: MatrixViewMut<'_, D>,
    fold_matrix: MatrixView<'_, F>,
    consider_low_folds: bool,
) -> Result<()> {
    let distinct = output_indices.columns();
    ensure_cmp!(DomainViolation, output_indices.name(), distinct, <, fold_matrix.columns());
    ensure_cmp!(SizeMismatch, output_indices.name(), output_indices.rows(), ==, fold_matrix.rows());
    ensure_cmp!(SizeMismatch, output_folds.name(), output_folds.rows(), ==, fold_matrix.rows());
    ensure_cmp!(SizeMismatch, output_folds.name(), output_folds.columns(), ==, distinct);

    let index_rows = output_indices.share();
    let fold_rows = output_folds.share();
    for_each_unit(mode, fold_matrix.rows(), |row| {
        let folds = fold_matrix.get_row(row)?.as_slice();
        // SAFETY: each unit owns exactly one row of both outputs.
        let (mut row_indices, mut row_folds) = unsafe { (index_rows.row(row)?, fold_rows.row(row)?) };
        let order = by_fold_descending(folds, consider_low_folds);

        with_scratch(|scratch| {
            let positions = &mut scratch.positions;
            identity_positions(positions, folds.len());
            positions.select_nth_unstable_by(distinct, &order);
            positions.truncate(distinct);
            positions.sort_by(&order);

            let (indices, values) = (row_indices.as_mut_slice(), row_folds.as_mut_slice());
            for (location, &column) in positions.iter().enumerate() {
                indices[location] = I::from_position(column);
                values[location] = folds[column].convert();
            }
        });
        Ok(())
    })
}
