//! Dispatch harness: one independent unit of work per row or band.
//!
//! Every kernel reduces to "run `f(index)` for each index in `0..units`". The
//! harness runs the units inline or fans them out over rayon's global pool
//! (sized by `RAYON_NUM_THREADS`, defaulting to the number of cores), whose
//! work stealing balances rows and bands of uneven size.

use crate::maybe_sync::{MaybeSend, MaybeSync};
use crate::Result;

/// Fewer units than this always run inline.
pub const MIN_PARALLEL_UNITS: usize = 2;

/// Multiplier decorrelating the random streams of consecutive rows or bands.
pub const SEED_STRIDE: u64 = 997;

/// Whether a kernel call may use the worker pool.
///
/// A caller that has already fanned its work out over independent workers
/// passes [`ExecutionMode::Sequential`] so kernels never nest parallelism.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    #[default]
    Parallel,
    Sequential,
}

impl ExecutionMode {
    /// Mode for a caller that is (or is not) already running in parallel.
    pub fn for_external_parallelism(externally_parallel: bool) -> Self {
        if externally_parallel {
            ExecutionMode::Sequential
        } else {
            ExecutionMode::Parallel
        }
    }

    /// Whether `units` units of work would actually be spread over workers.
    ///
    /// Always `false` without the `parallel` feature.
    #[inline]
    pub fn fans_out(self, units: usize) -> bool {
        cfg!(feature = "parallel") && self == ExecutionMode::Parallel && units >= MIN_PARALLEL_UNITS
    }
}

/// Seed of the random stream of row or band `index`.
///
/// Seed `0` is passed through unchanged for every unit, so all units draw from
/// identical streams. Any other seed `s` yields `s + index * 997`.
#[inline]
pub fn unit_seed(seed: u64, index: usize) -> u64 {
    if seed == 0 {
        0
    } else {
        seed.wrapping_add((index as u64).wrapping_mul(SEED_STRIDE))
    }
}

/// Run `f` once for every index in `0..units`.
///
/// Stops at the first error in sequential mode. In parallel mode units
/// already running finish, and one of the errors is returned.
pub fn for_each_unit<F>(mode: ExecutionMode, units: usize, f: F) -> Result<()>
where
    F: Fn(usize) -> Result<()> + MaybeSend + MaybeSync,
{
    let fan_out = mode.fans_out(units);
    tracing::trace!(units, fan_out, "dispatching units");

    #[cfg(feature = "parallel")]
    if fan_out {
        use rayon::prelude::*;
        return (0..units).into_par_iter().try_for_each(f);
    }

    (0..units).try_for_each(f)
}
