//! Per-database memory accounting.
//!
//! Every long-lived heap allocation the engine makes on behalf of a
//! database (cache page buffers, uncoupled cursor keys) is charged against
//! the database's [`MemTracker`]. The tracker enforces an optional hard
//! limit and keeps enough bookkeeping to detect leaks when the database is
//! torn down: after close, with all cursors dropped, `in_use()` must be
//! zero.
//!
//! Counters are atomics so the tracker can be read without holding the
//! database lock (diagnostics, tests).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use eyre::{eyre, Result, WrapErr};

use crate::error::DbError;

#[derive(Debug, Default)]
pub struct MemTracker {
    limit: usize,
    in_use: AtomicUsize,
    peak: AtomicUsize,
    allocs: AtomicU64,
    frees: AtomicU64,
}

impl MemTracker {
    /// Unlimited tracker; accounting only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker with a hard limit in bytes. Charges that would exceed the
    /// limit fail with `OutOfMemory` and leave the counters untouched.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn charge(&self, bytes: usize) -> Result<()> {
        let prev = self.in_use.fetch_add(bytes, Ordering::AcqRel);
        if self.limit != 0 && prev + bytes > self.limit {
            self.in_use.fetch_sub(bytes, Ordering::AcqRel);
            return Err(eyre!(DbError::OutOfMemory)).wrap_err_with(|| {
                format!(
                    "memory limit exceeded: {} + {} > {}",
                    prev, bytes, self.limit
                )
            });
        }
        self.allocs.fetch_add(1, Ordering::Relaxed);
        self.peak.fetch_max(prev + bytes, Ordering::AcqRel);
        Ok(())
    }

    pub fn release(&self, bytes: usize) {
        let prev = self.in_use.fetch_sub(bytes, Ordering::AcqRel);
        debug_assert!(prev >= bytes, "releasing more memory than charged");
        self.frees.fetch_add(1, Ordering::Relaxed);
    }

    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    /// Bytes still charged. Non-zero after teardown means a leak.
    pub fn report_leaks(&self) -> usize {
        self.in_use()
    }

    pub fn alloc_count(&self) -> u64 {
        self.allocs.load(Ordering::Relaxed)
    }

    pub fn free_count(&self) -> u64 {
        self.frees.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_and_release_balance() {
        let mem = MemTracker::new();

        mem.charge(4096).unwrap();
        mem.charge(128).unwrap();
        assert_eq!(mem.in_use(), 4224);

        mem.release(128);
        mem.release(4096);
        assert_eq!(mem.in_use(), 0);
        assert_eq!(mem.report_leaks(), 0);
        assert_eq!(mem.alloc_count(), 2);
        assert_eq!(mem.free_count(), 2);
    }

    #[test]
    fn peak_tracks_high_water_mark() {
        let mem = MemTracker::new();

        mem.charge(1000).unwrap();
        mem.release(1000);
        mem.charge(500).unwrap();

        assert_eq!(mem.peak(), 1000);
        mem.release(500);
    }

    #[test]
    fn limit_is_enforced() {
        let mem = MemTracker::with_limit(1024);

        mem.charge(1000).unwrap();
        let err = mem.charge(100).unwrap_err();
        assert_eq!(DbError::of(&err), DbError::OutOfMemory);

        // the failed charge must not stick
        assert_eq!(mem.in_use(), 1000);
        mem.release(1000);
    }

    #[test]
    fn leak_report_flags_outstanding_bytes() {
        let mem = MemTracker::new();
        mem.charge(64).unwrap();
        assert_eq!(mem.report_leaks(), 64);
        mem.release(64);
    }
}
