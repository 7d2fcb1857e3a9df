//! Per-worker scratch buffers.
//!
//! Each worker thread keeps its own buffers, grown on demand and reused across
//! units and calls. Contents are meaningless between uses; every user resizes
//! and overwrites what it needs.

use std::cell::RefCell;

#[derive(Debug, Default)]
pub(crate) struct Scratch {
    /// Local positions being selected or sorted.
    pub(crate) positions: Vec<usize>,
    /// Sampling tree node weights.
    pub(crate) tree: Vec<u64>,
}

thread_local! {
    static SCRATCH: RefCell<Scratch> = RefCell::new(Scratch::default());
}

/// Run `f` with the calling worker's scratch buffers.
///
/// Must not be re-entered from within `f`.
pub(crate) fn with_scratch<R>(f: impl FnOnce(&mut Scratch) -> R) -> R {
    SCRATCH.with(|scratch| f(&mut scratch.borrow_mut()))
}

/// Reset `positions` to `0..len`.
#[inline]
pub(crate) fn identity_positions(positions: &mut Vec<usize>, len: usize) {
    positions.clear();
    positions.extend(0..len);
}
