/*
 * sync.rs
 *
 * One-time initialization without std. The heap handle is created through
 * this on first use, from whichever thread gets there first.
 *
 * States: EMPTY -> BUSY -> READY, never backwards. The thread that wins
 * the EMPTY -> BUSY exchange runs the initializer; everyone else spins
 * until READY. The initializer is cheap (a few loads), so spinning beats
 * parking.
 */

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU8, Ordering};

const EMPTY: u8 = 0;
const BUSY: u8 = 1;
const READY: u8 = 2;

/// Write-once cell, safe to race on.
///
/// Ordering contract:
/// - the winner publishes the value with a `Release` store of `READY`
/// - readers observe `READY` with `Acquire` before touching the value
/// - the value is never mutated again, only shared
pub struct AtomicOnce<T> {
    state: AtomicU8,
    slot: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: the slot is written by exactly one thread (the EMPTY -> BUSY winner)
// and only read after an Acquire load of READY, which pairs with the winner's
// Release store. After READY only shared references are handed out, so
// sharing requires T: Sync, and the value may be dropped on another thread,
// so T: Send.
unsafe impl<T: Send + Sync> Sync for AtomicOnce<T> {}

// SAFETY: moving the cell moves the (possibly initialized) T with it.
unsafe impl<T: Send> Send for AtomicOnce<T> {}

impl<T> AtomicOnce<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            slot: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    /// The value, if some thread finished initializing it.
    #[inline]
    pub fn get(&self) -> Option<&T> {
        if self.is_ready() {
            // SAFETY: READY observed with Acquire; the value was fully written
            // before the matching Release store and is immutable from then on.
            Some(unsafe { self.ready_ref() })
        } else {
            None
        }
    }

    /// Store `value` unless another thread already claimed the cell.
    pub fn set(&self, value: T) -> Result<(), T> {
        if self.claim() {
            self.publish(value);
            Ok(())
        } else {
            Err(value)
        }
    }

    /// Return the value, running `init` first if nobody has.
    #[inline]
    pub fn get_or_init<F>(&self, init: F) -> &T
    where
        F: FnOnce() -> T,
    {
        if self.is_ready() {
            // SAFETY: see get().
            return unsafe { self.ready_ref() };
        }
        self.init_cold(init)
    }

    #[cold]
    fn init_cold<F>(&self, init: F) -> &T
    where
        F: FnOnce() -> T,
    {
        if self.claim() {
            self.publish(init());
        } else {
            /* lost the race: wait for the winner to publish */
            while self.state.load(Ordering::Acquire) != READY {
                core::hint::spin_loop();
            }
        }
        // SAFETY: either we published (our own Release store happens-before
        // this read) or we spun until an Acquire load saw READY.
        unsafe { self.ready_ref() }
    }

    /* EMPTY -> BUSY. true for exactly one caller over the cell's lifetime */
    #[inline]
    fn claim(&self) -> bool {
        self.state
            .compare_exchange(EMPTY, BUSY, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /* BUSY -> READY, caller must hold the claim */
    fn publish(&self, value: T) {
        // SAFETY: the caller won claim(), so no other thread reads or writes
        // the slot until READY is stored below.
        unsafe {
            (*self.slot.get()).write(value);
        }
        self.state.store(READY, Ordering::Release);
    }

    /// # Safety
    ///
    /// State must have been observed as READY with Acquire ordering (or the
    /// caller published the value itself).
    #[inline]
    unsafe fn ready_ref(&self) -> &T {
        // SAFETY: forwarded from the caller; READY implies the slot is initialized.
        unsafe { (*self.slot.get()).assume_init_ref() }
    }
}

impl<T> Default for AtomicOnce<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AtomicOnce<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == READY {
            // SAFETY: READY means the slot holds an initialized T, and &mut self
            // guarantees no outstanding shared borrows.
            unsafe { self.slot.get_mut().assume_init_drop() }
        }
    }
}


/* -------------------------------------------------------------------------- */
/*                              kani proofs                                   */
/* -------------------------------------------------------------------------- */

#[cfg(kani)]
mod kani_proofs {
    use super::*;

    /*
     * a successful set() leaves the cell READY and get() returns the value.
     */
    #[kani::proof]
    fn verify_set_publishes() {
        let cell: AtomicOnce<u32> = AtomicOnce::new();
        let value: u32 = kani::any();
        kani::assert(cell.set(value).is_ok(), "first set on a fresh cell wins");
        kani::assert(cell.is_ready(), "cell is READY after set");
        kani::assert(cell.get() == Some(&value), "get returns the published value");
    }

    /*
     * a second set() is refused and hands the value back untouched.
     */
    #[kani::proof]
    fn verify_second_set_refused() {
        let cell: AtomicOnce<u32> = AtomicOnce::new();
        let a: u32 = kani::any();
        let b: u32 = kani::any();
        let _ = cell.set(a);
        kani::assert(cell.set(b) == Err(b), "second set returns its argument");
        kani::assert(cell.get() == Some(&a), "first value survives");
    }
}
