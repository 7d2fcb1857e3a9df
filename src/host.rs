//! Host-runtime lock handling at the embedding boundary.
//!
//! A host runtime with a global execution lock (an interpreter lock, say)
//! must not hold it while kernels run: none of them call back into the host.
//! The boundary wraps every kernel call in a [`Released`] guard, which gives
//! the lock up on creation and takes it back on drop, also when unwinding.

/// A host-wide lock the boundary releases around kernel calls.
pub trait HostLock {
    /// Give up the lock. Called once before the kernel starts.
    fn release(&self);

    /// Take the lock back. Called once after the kernel returns.
    fn reacquire(&self);
}

/// Host without a global lock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NoHostLock;

impl HostLock for NoHostLock {
    #[inline]
    fn release(&self) {}

    #[inline]
    fn reacquire(&self) {}
}

impl<H: HostLock + ?Sized> HostLock for &H {
    fn release(&self) {
        (**self).release()
    }

    fn reacquire(&self) {
        (**self).reacquire()
    }
}

/// Scoped release of a [`HostLock`].
#[must_use = "the host lock is reacquired as soon as the guard is dropped"]
pub struct Released<'h, H: HostLock + ?Sized> {
    host: &'h H,
}

impl<'h, H: HostLock + ?Sized> Released<'h, H> {
    /// Release `host` until the guard is dropped.
    pub fn new(host: &'h H) -> Self {
        host.release();
        Self { host }
    }
}

impl<H: HostLock + ?Sized> Drop for Released<'_, H> {
    fn drop(&mut self) {
        self.host.reacquire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<&'static str>>,
    }

    impl HostLock for Recorder {
        fn release(&self) {
            self.events.borrow_mut().push("release");
        }

        fn reacquire(&self) {
            self.events.borrow_mut().push("reacquire");
        }
    }

    #[test]
    fn test_guard_pairs_release_and_reacquire() {
        let host = Recorder::default();
        {
            let _released = Released::new(&host);
            host.events.borrow_mut().push("work");
        }
        assert_eq!(*host.events.borrow(), ["release", "work", "reacquire"]);
    }

    #[test]
    fn test_guard_reacquires_on_unwind() {
        let host = Recorder::default();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _released = Released::new(&host);
            panic!("kernel failed");
        }));
        assert!(result.is_err());
        assert_eq!(*host.events.borrow(), ["release", "reacquire"]);
    }
}
