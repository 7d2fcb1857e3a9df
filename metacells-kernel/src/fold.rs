//! Log-fold-change of observed over expected values.
//!
//! For an entry of band `b` and element `e`, the expected value is
//! `band_totals[b] * element_fractions[e]` and the fold factor is
//! `log2((value + 1) / (expected + 1))`, replaced by zero when below
//! the caller's minimum.

use metacells_view::{
    ensure_cmp, ArrayView, CompressedViewMut, DataElement, IndexElement, MatrixViewMut, Result,
};

use crate::threading::{for_each_unit, ExecutionMode};

/// Fold factor of `value` against `expected`, zero below `min_fold_factor`.
#[inline]
pub fn fold_factor(value: f64, expected: f64, min_fold_factor: f64) -> f64 {
    let fold = ((value + 1.0) / (expected + 1.0)).log2();
    if fold < min_fold_factor {
        0.0
    } else {
        fold
    }
}

#[inline]
fn fold_in_place<D: DataElement>(value: &mut D, expected: f64, min_fold_factor: f64) {
    *value = D::from_f64(fold_factor(value.as_f64(), expected, min_fold_factor));
}

/// Replace every entry of a dense matrix by its fold factor, in place.
///
/// `row_totals` has one entry per row, `column_fractions` one per column.
pub fn fold_factor_dense<D: DataElement>(
    mode: ExecutionMode,
    mut data: MatrixViewMut<'_, D>,
    min_fold_factor: f64,
    row_totals: ArrayView<'_, D>,
    column_fractions: ArrayView<'_, D>,
) -> Result<()> {
    ensure_cmp!(SizeMismatch, row_totals.name(), row_totals.len(), ==, data.rows());
    ensure_cmp!(SizeMismatch, column_fractions.name(), column_fractions.len(), ==, data.columns());

    let rows = data.share();
    for_each_unit(mode, rows.rows(), |row| {
        // SAFETY: each unit owns exactly one row.
        let mut values = unsafe { rows.row(row)? };
        let row_total = row_totals[row].as_f64();
        for (value, &fraction) in values.as_mut_slice().iter_mut().zip(column_fractions.iter()) {
            fold_in_place(value, row_total * fraction.as_f64(), min_fold_factor);
        }
        Ok(())
    })
}

/// Replace every stored entry of a compressed matrix by its fold factor, in
/// place.
///
/// `band_totals` has one entry per band, `element_fractions` one per element.
pub fn fold_factor_compressed<D: DataElement, I: IndexElement, P: IndexElement>(
    mode: ExecutionMode,
    mut data: CompressedViewMut<'_, D, I, P>,
    min_fold_factor: f64,
    band_totals: ArrayView<'_, D>,
    element_fractions: ArrayView<'_, D>,
) -> Result<()> {
    ensure_cmp!(SizeMismatch, band_totals.name(), band_totals.len(), ==, data.bands());
    ensure_cmp!(
        SizeMismatch,
        element_fractions.name(),
        element_fractions.len(),
        ==,
        data.elements_count()
    );

    let bands = data.share();
    for_each_unit(mode, bands.bands(), |band| {
        // SAFETY: each unit owns exactly one band.
        let (mut values, indices) = unsafe { bands.band(band)? };
        let band_total = band_totals[band].as_f64();
        for (value, &index) in values.as_mut_slice().iter_mut().zip(indices.as_slice()) {
            let fraction = element_fractions.get(index.as_position())?.as_f64();
            fold_in_place(value, band_total * fraction, min_fold_factor);
        }
        Ok(())
    })
}
