/*
 * buffer.rs
 *
 * Typed storage with no idea what is initialized. RawBuf owns `capacity`
 * slots of T obtained from a RawAlloc; the container on top owns the
 * knowledge of which slots are live.
 *
 * RawBuf never constructs or drops a T. Its Drop only returns memory.
 */

use core::marker::PhantomData;
use core::mem::{self, MaybeUninit};
use core::ptr::NonNull;
use core::slice;

use crate::error::{CrtError, Result};
use crate::heap::RawAlloc;
use crate::trap;

pub(crate) struct RawBuf<T, A: RawAlloc> {
    ptr: NonNull<T>,
    cap: usize,
    alloc: A,
    _owns: PhantomData<T>,
}

// SAFETY: RawBuf owns its slots like a Box<[MaybeUninit<T>]> would; sending
// it sends the Ts and the allocator handle.
unsafe impl<T: Send, A: RawAlloc + Send> Send for RawBuf<T, A> {}

// SAFETY: shared access only hands out shared views of the slots.
unsafe impl<T: Sync, A: RawAlloc + Sync> Sync for RawBuf<T, A> {}

impl<T, A: RawAlloc> RawBuf<T, A> {
    const IS_ZST: bool = mem::size_of::<T>() == 0;

    #[inline]
    pub const fn new_in(alloc: A) -> Self {
        Self {
            ptr: NonNull::dangling(),
            cap: 0,
            alloc,
            _owns: PhantomData,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.cap
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Pointer to slot `index`; `index <= capacity`.
    #[inline]
    pub fn slot(&self, index: usize) -> *mut T {
        debug_assert!(index <= self.cap);
        // SAFETY: index <= cap keeps the offset inside (or one past) the
        // allocation; for ZSTs the offset is zero bytes.
        unsafe { self.ptr.as_ptr().add(index) }
    }

    /// Slots `[from, capacity)` as possibly-uninitialized memory.
    #[inline]
    pub fn spare_from(&mut self, from: usize) -> &mut [MaybeUninit<T>] {
        debug_assert!(from <= self.cap);
        // SAFETY: [from, cap) lies inside the allocation and MaybeUninit
        // places no requirement on the contents.
        unsafe { slice::from_raw_parts_mut(self.slot(from).cast(), self.cap - from) }
    }

    fn bytes_for(cap: usize) -> Result<usize> {
        cap.checked_mul(mem::size_of::<T>())
            .filter(|&b| b <= isize::MAX as usize)
            .ok_or(CrtError::CapacityOverflow)
    }

    /// Move the buffer to `new_cap` slots. Contents of the first
    /// `min(cap, new_cap)` slots are carried over byte for byte.
    pub fn try_set_capacity(&mut self, new_cap: usize) -> Result<()> {
        if new_cap == self.cap {
            return Ok(());
        }
        if Self::IS_ZST {
            self.cap = new_cap;
            return Ok(());
        }
        let bytes = Self::bytes_for(new_cap)?;
        let align = mem::align_of::<T>();

        let raw = if self.cap == 0 {
            self.alloc.allocate(bytes, align)?
        } else {
            // SAFETY: ptr is live from self.alloc with align_of::<T>().
            unsafe { self.alloc.reallocate(self.ptr.as_ptr().cast(), bytes, align)? }
        };
        self.ptr = raw.cast();
        self.cap = new_cap;
        Ok(())
    }

    /// A second block of `cap` slots from the same allocator, for callers
    /// that rebuild rather than move (the map's rehash). Hand it back
    /// through [`RawBuf::replace_block`].
    pub fn try_alloc_block(&self, cap: usize) -> Result<NonNull<T>> {
        if Self::IS_ZST || cap == 0 {
            return Ok(NonNull::dangling());
        }
        let bytes = Self::bytes_for(cap)?;
        Ok(self.alloc.allocate(bytes, mem::align_of::<T>())?.cast())
    }

    /// Release the current block and adopt `block`.
    ///
    /// # Safety
    ///
    /// `block` must come from [`RawBuf::try_alloc_block`] on this buffer
    /// with the same `cap`, and nothing live may remain in the old block.
    pub unsafe fn replace_block(&mut self, block: NonNull<T>, cap: usize) {
        // SAFETY: forwarded from the caller.
        unsafe { self.release() };
        self.ptr = block;
        self.cap = cap;
    }

    /* returns the block to the allocator; the buffer must not be used after
     * without a replace_block */
    unsafe fn release(&mut self) {
        if self.cap != 0 && !Self::IS_ZST {
            // SAFETY: ptr is live from self.alloc with align_of::<T>(); the
            // caller has already dropped whatever lived in the slots.
            unsafe {
                self.alloc
                    .deallocate(self.ptr.as_ptr().cast(), mem::align_of::<T>());
            }
        }
    }

    #[inline]
    #[track_caller]
    pub fn set_capacity(&mut self, new_cap: usize) {
        trap::or_abort(self.try_set_capacity(new_cap));
    }
}

impl<T, A: RawAlloc> Drop for RawBuf<T, A> {
    fn drop(&mut self) {
        // SAFETY: the owner has dropped the contents; the buffer dies here.
        unsafe { self.release() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{Exhausted, Tracking};

    #[test]
    fn test_grow_keeps_bytes() {
        let tracking = Tracking::new();
        let mut buf: RawBuf<u32, _> = RawBuf::new_in(&tracking);
        buf.set_capacity(4);
        for (i, slot) in buf.spare_from(0).iter_mut().enumerate() {
            slot.write(i as u32 * 10);
        }
        buf.set_capacity(64);
        for i in 0..4 {
            // SAFETY: slots 0..4 were written above and carried over.
            assert_eq!(unsafe { *buf.slot(i) }, i as u32 * 10);
        }
        assert_eq!(buf.spare_from(4).len(), 60);
        drop(buf);
        assert_eq!(tracking.live_blocks(), 0);
    }

    #[test]
    fn test_replace_block_frees_old() {
        let tracking = Tracking::new();
        let mut buf: RawBuf<u64, _> = RawBuf::new_in(&tracking);
        buf.set_capacity(13);
        let block = buf.try_alloc_block(29).unwrap();
        assert_eq!(tracking.live_blocks(), 2);
        // SAFETY: block came from this buffer with cap 29; u64 needs no drop.
        unsafe { buf.replace_block(block, 29) };
        assert_eq!(buf.capacity(), 29);
        assert_eq!(tracking.live_blocks(), 1);
        drop(buf);
        assert_eq!(tracking.live_blocks(), 0);
    }

    #[test]
    fn test_zst_never_allocates() {
        let tracking = Tracking::new();
        let mut buf: RawBuf<(), _> = RawBuf::new_in(&tracking);
        buf.set_capacity(1 << 20);
        assert_eq!(buf.capacity(), 1 << 20);
        assert_eq!(tracking.allocations(), 0);
    }

    #[test]
    fn test_overflow_reported() {
        let mut buf: RawBuf<u64, _> = RawBuf::new_in(crate::heap::Heap);
        assert_eq!(
            buf.try_set_capacity(usize::MAX / 2),
            Err(CrtError::CapacityOverflow)
        );
        assert_eq!(buf.capacity(), 0);
    }

    #[test]
    fn test_failed_growth_leaves_buffer_intact() {
        let mut buf: RawBuf<u8, _> = RawBuf::new_in(Exhausted);
        assert!(matches!(
            buf.try_set_capacity(8),
            Err(CrtError::AllocFailed { size: 8, align: 1 })
        ));
        assert_eq!(buf.capacity(), 0);
    }
}
