//! Weighted downsampling without replacement.
//!
//! Input values are counts of indivisible units (e.g. molecules). Drawing
//! `samples` units without replacement yields an output whose entries sum to
//! `min(total, samples)` and never exceed the corresponding input entry.
//!
//! Draws go through a [`SamplingTree`]: a complete binary sum-tree over the
//! weights. Each draw picks a uniform `r` in `[0, remaining)` and descends from
//! the root, decrementing every node on the way, so a leaf can never yield
//! more units than it started with.

use metacells_view::{
    ensure_cmp, validate_indptr, ArrayView, ArrayViewMut, DataElement, Disjoint, IndexElement,
    MatrixView, MatrixViewMut, Result,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::scratch::with_scratch;
use crate::threading::{for_each_unit, unit_seed, ExecutionMode};

/// Number of tree nodes needed to sample from `size` weights.
///
/// Zero for `size <= 1`, which never builds a tree. Otherwise the leaves are
/// padded to the next power of two `w` and the tree holds `2 * w - 1` nodes.
pub fn sampling_tree_size(size: usize) -> usize {
    if size <= 1 {
        0
    } else {
        2 * size.next_power_of_two() - 1
    }
}

/// Complete binary sum-tree consumed destructively by draws.
///
/// Nodes are stored level by level: the (zero-padded) leaves first, the root
/// last. Every internal node holds the sum of its two children.
#[derive(Debug)]
pub struct SamplingTree<'s> {
    nodes: &'s mut [u64],
}

impl<'s> SamplingTree<'s> {
    /// Build the tree over `weights` in `storage`, which is resized to fit.
    ///
    /// Requires at least two weights, all non-negative.
    pub fn build<D: DataElement>(
        weights: ArrayView<'_, D>,
        storage: &'s mut Vec<u64>,
    ) -> Result<Self> {
        let name = weights.name();
        ensure_cmp!(SizeMismatch, name, weights.len(), >=, 2);

        storage.clear();
        storage.resize(sampling_tree_size(weights.len()), 0);
        for (leaf, &weight) in storage.iter_mut().zip(weights.iter()) {
            ensure_cmp!(DomainViolation, name, weight.as_f64(), >=, 0.0);
            *leaf = weight.as_count();
        }

        let mut level_start = 0;
        let mut level_width = weights.len().next_power_of_two();
        while level_width > 1 {
            let parent_start = level_start + level_width;
            for index in 0..level_width / 2 {
                let left = storage[level_start + 2 * index];
                let right = storage[level_start + 2 * index + 1];
                storage[parent_start + index] = left + right;
            }
            level_start = parent_start;
            level_width /= 2;
        }
        debug_assert_eq!(level_start + 1, storage.len());

        Ok(Self {
            nodes: storage.as_mut_slice(),
        })
    }

    /// Units not yet drawn.
    #[inline]
    pub fn total(&self) -> u64 {
        self.nodes[self.nodes.len() - 1]
    }

    /// Units of leaf `leaf` not yet drawn.
    #[inline]
    pub fn remaining(&self, leaf: usize) -> u64 {
        self.nodes[leaf]
    }

    /// Draw the unit ranked `random` among the remaining ones.
    ///
    /// Returns the index of the leaf owning it. `random` must be below
    /// [`total`](Self::total).
    pub fn draw(&mut self, mut random: u64) -> usize {
        let nodes = &mut *self.nodes;
        let mut level_base = nodes.len() - 1;
        let mut level_width = 1;
        let mut index_in_level = 0;

        loop {
            let node = level_base + index_in_level;
            debug_assert!(nodes[node] > random, "sampling tree node {} exhausted", node);
            nodes[node] -= 1;

            level_width *= 2;
            if level_base < level_width {
                return index_in_level;
            }
            level_base -= level_width;
            index_in_level *= 2;

            let left = nodes[level_base + index_in_level];
            debug_assert_eq!(
                left + nodes[level_base + index_in_level + 1],
                nodes[node] + 1,
                "sampling tree sums diverged below node {}",
                node
            );
            if random >= left {
                random -= left;
                index_in_level += 1;
            }
        }
    }
}

fn downsample_slice<D: DataElement, O: DataElement>(
    input: ArrayView<'_, D>,
    mut output: ArrayViewMut<'_, O>,
    samples: u64,
    seed: u64,
) -> Result<()> {
    ensure_cmp!(SizeMismatch, output.name(), output.len(), ==, input.len());

    match input.len() {
        0 => return Ok(()),
        1 => {
            let weight = input[0];
            ensure_cmp!(DomainViolation, input.name(), weight.as_f64(), >=, 0.0);
            output[0] = if (samples as f64) < weight.as_f64() {
                O::from_count(samples)
            } else {
                weight.convert()
            };
            return Ok(());
        }
        _ => {}
    }

    with_scratch(|scratch| {
        let mut tree = SamplingTree::build(input, &mut scratch.tree)?;
        let output = output.as_mut_slice();

        if tree.total() <= samples {
            for (out, &weight) in output.iter_mut().zip(input.iter()) {
                *out = weight.convert();
            }
            return Ok(());
        }

        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..samples {
            let random = rng.random_range(0..tree.total());
            tree.draw(random);
        }

        for (leaf, (out, &weight)) in output.iter_mut().zip(input.iter()).enumerate() {
            *out = O::from_count(weight.as_count() - tree.remaining(leaf));
        }
        Ok(())
    })
}

/// Downsample one array of counts to at most `samples` units.
///
/// If the total is at most `samples` the input is copied unchanged. An input
/// of a single entry yields `min(samples, input[0])` without drawing.
pub fn downsample_array<D: DataElement, O: DataElement>(
    input: ArrayView<'_, D>,
    output: ArrayViewMut<'_, O>,
    samples: u64,
    seed: u64,
) -> Result<()> {
    downsample_slice(input, output, samples, seed)
}

/// Downsample every row of a dense matrix independently.
///
/// Row `i` draws from the stream seeded by [`unit_seed`]`(seed, i)`.
pub fn downsample_matrix<D: DataElement, O: DataElement>(
    mode: ExecutionMode,
    input: MatrixView<'_, D>,
    mut output: MatrixViewMut<'_, O>,
    samples: u64,
    seed: u64,
) -> Result<()> {
    ensure_cmp!(SizeMismatch, output.name(), output.rows(), ==, input.rows());
    ensure_cmp!(SizeMismatch, output.name(), output.columns(), ==, input.columns());

    let rows = output.share();
    for_each_unit(mode, input.rows(), |row| {
        // SAFETY: each unit owns exactly one row.
        let row_output = unsafe { rows.row(row)? };
        downsample_slice(input.get_row(row)?, row_output, samples, unit_seed(seed, row))
    })
}

/// Downsample every band of a compressed matrix independently.
///
/// `output` parallels `data`; band `b` draws from the stream seeded by
/// [`unit_seed`]`(seed, b)`.
pub fn downsample_compressed<D: DataElement, P: IndexElement, O: DataElement>(
    mode: ExecutionMode,
    data: ArrayView<'_, D>,
    indptr: ArrayView<'_, P>,
    output: ArrayViewMut<'_, O>,
    samples: u64,
    seed: u64,
) -> Result<()> {
    validate_indptr(indptr, data.len())?;
    ensure_cmp!(SizeMismatch, output.name(), output.len(), ==, data.len());

    let output = Disjoint::new(output);
    for_each_unit(mode, indptr.len() - 1, |band| {
        let start = indptr[band].as_position();
        let stop = indptr[band + 1].as_position();
        // SAFETY: bands of a monotonic offset buffer never overlap.
        let band_output = unsafe { output.window(start, stop)? };
        downsample_slice(data.slice(start, stop)?, band_output, samples, unit_seed(seed, band))
    })
}
