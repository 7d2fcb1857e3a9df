//! Random permutation of rows and bands.
//!
//! A compressed band is shuffled across the whole element domain: its values
//! are paired with a uniformly chosen set of distinct element indices, as if
//! the dense row (zeros included) had been permuted, then the band is sorted
//! back into index order.

use metacells_view::{
    ensure_cmp, CompressedViewMut, DataElement, IndexElement, MatrixViewMut, Result,
};
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::SeedableRng;

use crate::relayout::sort_band;
use crate::threading::{for_each_unit, unit_seed, ExecutionMode};

/// Uniformly permute the values of every row in place.
///
/// Row `i` draws from the stream seeded by [`unit_seed`]`(seed, i)`.
pub fn shuffle_matrix<D: DataElement>(
    mode: ExecutionMode,
    mut matrix: MatrixViewMut<'_, D>,
    seed: u64,
) -> Result<()> {
    let rows = matrix.share();
    for_each_unit(mode, rows.rows(), |row| {
        // SAFETY: each unit owns exactly one row.
        let mut values = unsafe { rows.row(row)? };
        let mut rng = StdRng::seed_from_u64(unit_seed(seed, row));
        values.as_mut_slice().shuffle(&mut rng);
        Ok(())
    })
}

/// Uniformly permute every band of a compressed matrix across its element
/// domain, keeping each band's values and its index order.
pub fn shuffle_compressed<D: DataElement, I: IndexElement, P: IndexElement>(
    mode: ExecutionMode,
    mut matrix: CompressedViewMut<'_, D, I, P>,
    seed: u64,
) -> Result<()> {
    let elements_count = matrix.elements_count();
    for band in 0..matrix.bands() {
        let band_len = matrix.band_range(band)?.len();
        ensure_cmp!(DomainViolation, matrix.name(), band_len, <=, elements_count);
    }

    let bands = matrix.share();
    for_each_unit(mode, bands.bands(), |band| {
        // SAFETY: each unit owns exactly one band.
        let (mut data, mut indices) = unsafe { bands.band(band)? };
        let (data, indices) = (data.as_mut_slice(), indices.as_mut_slice());
        let mut rng = StdRng::seed_from_u64(unit_seed(seed, band));

        data.shuffle(&mut rng);
        let picked = index::sample(&mut rng, elements_count, indices.len());
        for (slot, element) in indices.iter_mut().zip(picked.iter()) {
            *slot = I::from_position(element);
        }
        sort_band(data, indices);
        Ok(())
    })
}
