//! Rundown protection: lets a caller drain in-flight users of a resource
//! before tearing it down, without holding a lock across the drain.
//!
//! The callback registry uses one of these per registered callback so that
//! `Unregister` can block until any in-progress invocation of that callback
//! has returned, while `Invoke` never holds the registry's list lock while
//! the callback body runs.
//!
//! Encoding: bit 0 marks "rundown started" (no further acquires will
//! succeed); the remaining bits are a reference count shifted left by one.

use core::sync::atomic::{AtomicUsize, Ordering};

const RUNDOWN_ACTIVE: usize = 0x1;
const COUNT_STEP: usize = 0x2;
const COUNT_MASK: usize = !RUNDOWN_ACTIVE;

/// Reference-counted drain barrier, one per protected resource.
pub struct RundownProtection {
    state: AtomicUsize,
}

impl RundownProtection {
    pub const fn new() -> Self {
        Self {
            state: AtomicUsize::new(0),
        }
    }

    /// Take a reference. Fails once rundown has started.
    pub fn acquire(&self) -> bool {
        loop {
            let current = self.state.load(Ordering::Relaxed);
            if current & RUNDOWN_ACTIVE != 0 {
                return false;
            }
            let next = current + COUNT_STEP;
            if self
                .state
                .compare_exchange_weak(current, next, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Release a reference taken by `acquire`.
    pub fn release(&self) {
        self.state.fetch_sub(COUNT_STEP, Ordering::Release);
    }

    /// Mark rundown started and spin until every outstanding reference has
    /// been released. Returns only once the resource is safe to free.
    pub fn wait_for_rundown(&self) {
        let before = self.state.fetch_or(RUNDOWN_ACTIVE, Ordering::AcqRel);
        if before & COUNT_MASK == 0 {
            return;
        }
        while self.state.load(Ordering::Acquire) & COUNT_MASK != 0 {
            core::hint::spin_loop();
        }
    }

    pub fn is_rundown_active(&self) -> bool {
        self.state.load(Ordering::Relaxed) & RUNDOWN_ACTIVE != 0
    }

    pub fn reference_count(&self) -> usize {
        (self.state.load(Ordering::Relaxed) & COUNT_MASK) >> 1
    }
}

impl Default for RundownProtection {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII reference acquired from a [`RundownProtection`].
pub struct RundownGuard<'a> {
    owner: &'a RundownProtection,
}

impl<'a> RundownGuard<'a> {
    pub fn try_new(owner: &'a RundownProtection) -> Option<Self> {
        owner.acquire().then_some(Self { owner })
    }
}

impl<'a> Drop for RundownGuard<'a> {
    fn drop(&mut self) {
        self.owner.release();
    }
}
