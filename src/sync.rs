//! The flip synchronizer: a binary semaphore between the stream engine's
//! completion interrupt and the publishing task.
//!
//! This is the only mutable state shared across the interrupt boundary.
//! The engine's end-of-list ISR releases it; publishers acquire it to know
//! the buffer they are about to draw into is no longer being scanned out.
//! Acquiring spins: the wait is bounded by one ring traversal, which is a
//! refresh period.

use core::sync::atomic::{AtomicBool, Ordering};

/// Binary "buffer released" semaphore.
pub struct ShiftSync {
    available: AtomicBool,
}

impl ShiftSync {
    /// A new semaphore, initially available.
    pub const fn new() -> Self {
        ShiftSync { available: AtomicBool::new(true) }
    }

    /// Take the semaphore, spinning until it is available.
    pub fn acquire(&self) {
        while !self.try_acquire() {
            core::hint::spin_loop();
        }
    }

    /// Take the semaphore if it is available.
    pub fn try_acquire(&self) -> bool {
        self.available.swap(false, Ordering::Acquire)
    }

    /// Release the semaphore. Interrupt-safe.
    pub fn release_from_isr(&self) {
        self.available.store(true, Ordering::Release);
    }

    /// Force the semaphore back to available, for (re)initialisation.
    pub(crate) fn reset(&self) {
        self.available.store(true, Ordering::Release);
    }
}

impl Default for ShiftSync {
    fn default() -> Self {
        Self::new()
    }
}

/// The driver's flip semaphore. A static rather than a handle field so the
/// plain-`fn` completion callback can reach it from interrupt context.
pub(crate) static SHIFT_COMPLETE: ShiftSync = ShiftSync::new();

/// Completion callback registered with the stream engine. Does exactly one
/// thing, from ISR context: release the flip semaphore.
pub(crate) fn shift_complete_isr() {
    SHIFT_COMPLETE.release_from_isr();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_semantics() {
        let sem = ShiftSync::new();
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        sem.release_from_isr();
        assert!(sem.try_acquire());
        // Releasing twice still yields a single credit.
        sem.release_from_isr();
        sem.release_from_isr();
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
    }

    #[test]
    fn acquire_after_release_does_not_block() {
        let sem = ShiftSync::new();
        sem.acquire();
        sem.release_from_isr();
        sem.acquire();
        sem.release_from_isr();
    }
}
