/*
 * tracking.rs
 *
 * Allocator adapter that counts. Wrap any RawAlloc, hand it to a
 * container, drop the container, check live_blocks() == 0.
 *
 * Relaxed atomics: the counters are statistics, they order nothing.
 */

use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::error::Result;
use crate::heap::{Heap, RawAlloc};

/// Counting wrapper around another allocator.
#[derive(Debug, Default)]
pub struct Tracking<A: RawAlloc = Heap> {
    inner: A,
    live: AtomicUsize,
    allocations: AtomicUsize,
    reallocations: AtomicUsize,
    failures: AtomicUsize,
}

impl Tracking<Heap> {
    #[must_use]
    pub const fn new() -> Self {
        Self::wrap(Heap)
    }
}

impl<A: RawAlloc> Tracking<A> {
    #[must_use]
    pub const fn wrap(inner: A) -> Self {
        Self {
            inner,
            live: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
            reallocations: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Blocks handed out and not yet released.
    pub fn live_blocks(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    /// Successful `allocate` calls, including null-pointer reallocations.
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Successful `reallocate` calls on an existing block.
    pub fn reallocations(&self) -> usize {
        self.reallocations.load(Ordering::Relaxed)
    }

    /// Requests the inner allocator refused.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    fn note<T>(&self, result: &Result<T>, counter: &AtomicUsize) {
        match result {
            Ok(_) => {
                counter.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

// SAFETY: every call is forwarded to `inner`; only counters are added.
unsafe impl<A: RawAlloc> RawAlloc for Tracking<A> {
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        let result = self.inner.allocate(size, align);
        self.note(&result, &self.allocations);
        if result.is_ok() {
            self.live.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    unsafe fn reallocate(
        &self,
        ptr: *mut u8,
        new_size: usize,
        align: usize,
    ) -> Result<NonNull<u8>> {
        if ptr.is_null() {
            return self.allocate(new_size, align);
        }
        // SAFETY: caller's contract is forwarded as-is.
        let result = unsafe { self.inner.reallocate(ptr, new_size, align) };
        self.note(&result, &self.reallocations);
        result
    }

    unsafe fn deallocate(&self, ptr: *mut u8, align: usize) {
        if ptr.is_null() {
            return;
        }
        self.live.fetch_sub(1, Ordering::Relaxed);
        // SAFETY: caller's contract is forwarded as-is.
        unsafe { self.inner.deallocate(ptr, align) }
    }
}

/// Allocator that refuses everything. For exercising failure paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct Exhausted;

// SAFETY: never hands out memory, so there is nothing to keep valid.
unsafe impl RawAlloc for Exhausted {
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        Err(crate::error::CrtError::AllocFailed { size, align })
    }

    unsafe fn reallocate(
        &self,
        _ptr: *mut u8,
        new_size: usize,
        align: usize,
    ) -> Result<NonNull<u8>> {
        self.allocate(new_size, align)
    }

    unsafe fn deallocate(&self, _ptr: *mut u8, _align: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrtError;

    #[test]
    fn test_counts_round_trip() {
        let tracking = Tracking::new();
        let p = tracking.allocate(32, 8).unwrap();
        assert_eq!(tracking.live_blocks(), 1);
        // SAFETY: p is live with align 8.
        let q = unsafe { tracking.reallocate(p.as_ptr(), 64, 8) }.unwrap();
        assert_eq!(tracking.live_blocks(), 1);
        assert_eq!(tracking.reallocations(), 1);
        // SAFETY: q replaced p.
        unsafe { tracking.deallocate(q.as_ptr(), 8) };
        assert_eq!(tracking.live_blocks(), 0);
        assert_eq!(tracking.allocations(), 1);
    }

    #[test]
    fn test_failures_counted() {
        let tracking = Tracking::wrap(Exhausted);
        assert_eq!(
            tracking.allocate(8, 8),
            Err(CrtError::AllocFailed { size: 8, align: 8 })
        );
        assert_eq!(tracking.failures(), 1);
        assert_eq!(tracking.live_blocks(), 0);
    }

    #[test]
    fn test_null_deallocate_not_counted() {
        let tracking = Tracking::new();
        // SAFETY: null is a no-op.
        unsafe { tracking.deallocate(core::ptr::null_mut(), 8) };
        assert_eq!(tracking.live_blocks(), 0);
    }
}
