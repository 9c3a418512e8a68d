/*
 * heap.rs
 *
 * The raw allocator. One process-wide handle over the native heap,
 * created once through AtomicOnce, plus the RawAlloc trait every
 * container is generic over.
 *
 * Alignment: requests the native heap already satisfies (align <=
 * MIN_ALIGN) go straight through and carry no metadata. Stricter requests
 * over-allocate and park an AllocHeader right below the pointer we hand
 * out:
 *
 *   raw            header           user (aligned)
 *    |  padding ... | size|off|tag  | user bytes ...
 *    <------ off ------------------>
 *
 * The header is ours, written by allocate and checked by reallocate and
 * deallocate. Callers must pass back the alignment they allocated with;
 * a header whose tag is wrong means they didn't.
 */

use core::alloc::{GlobalAlloc, Layout};
use core::mem;
use core::ptr::{self, NonNull};

use crate::config::{ALIGNED_TAG, MAX_ALIGN, RELEASED_TAG};
use crate::error::{CrtError, Result};
use crate::sync::AtomicOnce;
use crate::{platform, trace, trap};

/// Raw byte allocator. Containers reach memory only through this.
///
/// # Safety
///
/// Implementors must return blocks of at least `size` bytes aligned to
/// `align`, must keep the first `min(old, new)` bytes across
/// `reallocate`, and must leave the old block valid when `reallocate`
/// fails.
pub unsafe trait RawAlloc {
    /// At least `size` writable bytes aligned to `align`.
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>>;

    /// Grow or shrink a block, moving it if needed. A null `ptr` behaves
    /// like [`RawAlloc::allocate`].
    ///
    /// # Safety
    ///
    /// `ptr` must be null or live from this allocator with the same `align`.
    unsafe fn reallocate(&self, ptr: *mut u8, new_size: usize, align: usize)
    -> Result<NonNull<u8>>;

    /// Release a block. Null is a no-op.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or live from this allocator with the same `align`.
    unsafe fn deallocate(&self, ptr: *mut u8, align: usize);
}

// SAFETY: forwards every call to the referenced allocator unchanged.
unsafe impl<A: RawAlloc + ?Sized> RawAlloc for &A {
    #[inline]
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        (**self).allocate(size, align)
    }

    #[inline]
    unsafe fn reallocate(
        &self,
        ptr: *mut u8,
        new_size: usize,
        align: usize,
    ) -> Result<NonNull<u8>> {
        // SAFETY: caller's contract is forwarded as-is.
        unsafe { (**self).reallocate(ptr, new_size, align) }
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: *mut u8, align: usize) {
        // SAFETY: caller's contract is forwarded as-is.
        unsafe { (**self).deallocate(ptr, align) }
    }
}

/* -------------------------------------------------------------------------- */
/*                              allocation header                             */
/* -------------------------------------------------------------------------- */

/// Metadata stored immediately before an over-aligned block.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct AllocHeader {
    /// Bytes the caller asked for.
    size: usize,
    /// Distance from the native block start to the user pointer.
    offset: u32,
    /// `ALIGNED_TAG` while live, `RELEASED_TAG` after release.
    tag: u32,
}

const HEADER_SIZE: usize = mem::size_of::<AllocHeader>();

impl AllocHeader {
    /// Header slot of an over-aligned user pointer.
    ///
    /// # Safety
    ///
    /// `user` must have come from [`HeapHandle::allocate_tagged`].
    #[inline]
    unsafe fn slot_of(user: NonNull<u8>) -> NonNull<AllocHeader> {
        // SAFETY: allocate_tagged always leaves HEADER_SIZE bytes of the same
        // native block below the user pointer.
        unsafe { user.sub(HEADER_SIZE).cast() }
    }

    /// Read and validate the header of `user`, trapping on a bad tag.
    ///
    /// # Safety
    ///
    /// Same as [`AllocHeader::slot_of`], modulo the tag check.
    #[track_caller]
    unsafe fn read_checked(user: NonNull<u8>, align: usize) -> (NonNull<AllocHeader>, AllocHeader) {
        // SAFETY: forwarded from the caller.
        let slot = unsafe { Self::slot_of(user) };
        // SAFETY: the slot is aligned for AllocHeader (user is aligned to at
        // least 16 and HEADER_SIZE is a multiple of the header's alignment)
        // and lies inside the native block.
        let header = unsafe { slot.read() };
        if header.tag != ALIGNED_TAG {
            trap::contract_violation(format_args!(
                "{}",
                CrtError::AlignmentMismatch { align }
            ));
        }
        (slot, header)
    }

    /// Validate the header of `user` and poison its tag, so any later
    /// release of the same pointer traps. Returns the header as it was.
    ///
    /// # Safety
    ///
    /// Same as [`AllocHeader::read_checked`]; the header must be writable.
    #[track_caller]
    unsafe fn take_checked(user: NonNull<u8>, align: usize) -> AllocHeader {
        // SAFETY: forwarded from the caller.
        let (mut slot, header) = unsafe { Self::read_checked(user, align) };
        // SAFETY: slot is valid for writes and was just read.
        unsafe { slot.as_mut().tag = RELEASED_TAG };
        header
    }
}

/* -------------------------------------------------------------------------- */
/*                                heap handle                                 */
/* -------------------------------------------------------------------------- */

/// The process-wide heap. Obtain it with [`handle`]; there is exactly one.
#[derive(Debug)]
pub struct HeapHandle {
    native_align: usize,
}

static HEAP: AtomicOnce<HeapHandle> = AtomicOnce::new();

/// Create the heap handle now instead of on the first allocation.
/// Calling it again is harmless.
pub fn initialize() -> &'static HeapHandle {
    handle()
}

/// The heap handle, created on first use by whichever thread gets there.
#[inline]
pub fn handle() -> &'static HeapHandle {
    HEAP.get_or_init(HeapHandle::open)
}

/// Whether any thread has created the handle yet.
#[inline]
pub fn is_initialized() -> bool {
    HEAP.is_ready()
}

#[inline]
fn check_align(align: usize) -> Result<()> {
    if align.is_power_of_two() && align <= MAX_ALIGN {
        Ok(())
    } else {
        Err(CrtError::UnsupportedAlignment(align))
    }
}

impl HeapHandle {
    fn open() -> Self {
        let handle = Self {
            native_align: platform::MIN_ALIGN,
        };
        trace!("heap handle ready, native alignment {}", handle.native_align);
        handle
    }

    /// Alignment the native heap guarantees without a header.
    #[inline]
    pub fn native_align(&self) -> usize {
        self.native_align
    }

    /// Whether blocks of this alignment carry an [`AllocHeader`].
    #[inline]
    pub fn needs_header(&self, align: usize) -> bool {
        align > self.native_align
    }

    fn allocate_native(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        // SAFETY: size was clamped to at least 1 by the caller.
        let raw = unsafe { platform::acquire(size) };
        NonNull::new(raw).ok_or(CrtError::AllocFailed { size, align })
    }

    /// Over-aligned path: native block of size + header + slack, header
    /// written just below the aligned user pointer.
    fn allocate_tagged(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        let total = size
            .checked_add(HEADER_SIZE + align - 1)
            .ok_or(CrtError::CapacityOverflow)?;
        // SAFETY: total >= HEADER_SIZE > 0.
        let raw = unsafe { platform::acquire(total) };
        let Some(raw) = NonNull::new(raw) else {
            return Err(CrtError::AllocFailed { size, align });
        };

        let base = raw.as_ptr() as usize;
        let user_addr = (base + HEADER_SIZE + align - 1) & !(align - 1);
        let offset = user_addr - base;

        /* offset <= HEADER_SIZE + MAX_ALIGN - 1, well inside u32 */
        #[allow(clippy::cast_possible_truncation)]
        let offset32 = offset as u32;

        // SAFETY: offset <= HEADER_SIZE + align - 1, so user + size stays inside
        // the `total` bytes we just acquired. Deriving from `raw` keeps provenance.
        let user = unsafe { raw.add(offset) };
        // SAFETY: user - HEADER_SIZE >= raw because offset >= HEADER_SIZE.
        let slot = unsafe { AllocHeader::slot_of(user) };
        // SAFETY: slot is inside the block and aligned (see read_checked).
        unsafe {
            slot.write(AllocHeader {
                size,
                offset: offset32,
                tag: ALIGNED_TAG,
            });
        }
        Ok(user)
    }

    /// # Safety
    ///
    /// `user` must be a live tagged block.
    #[track_caller]
    unsafe fn release_tagged(&self, user: NonNull<u8>, align: usize) {
        // SAFETY: forwarded from the caller. A second release of the same
        // block traps on the poisoned tag instead of freeing a bogus base.
        let header = unsafe { AllocHeader::take_checked(user, align) };
        // SAFETY: header.offset is the distance allocate_tagged moved forward
        // from the native block start.
        let base = unsafe { user.sub(header.offset as usize) };
        // SAFETY: base is the pointer platform::acquire returned.
        unsafe { platform::release(base.as_ptr()) };
    }
}

// SAFETY: native blocks come from malloc (aligned to native_align, at least
// `size` bytes), tagged blocks are carved out of a native block sized to fit
// header + padding + size. Reallocation copies min(old, new) bytes and only
// releases the old block after the new one exists.
unsafe impl RawAlloc for HeapHandle {
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        check_align(align)?;
        let size = size.max(1);
        if self.needs_header(align) {
            self.allocate_tagged(size, align)
        } else {
            self.allocate_native(size, align)
        }
    }

    #[track_caller]
    unsafe fn reallocate(
        &self,
        ptr: *mut u8,
        new_size: usize,
        align: usize,
    ) -> Result<NonNull<u8>> {
        let Some(old) = NonNull::new(ptr) else {
            return self.allocate(new_size, align);
        };
        check_align(align)?;
        let new_size = new_size.max(1);

        if !self.needs_header(align) {
            // SAFETY: caller guarantees ptr is a live native block.
            let moved = unsafe { platform::resize(old.as_ptr(), new_size) };
            return NonNull::new(moved).ok_or(CrtError::AllocFailed {
                size: new_size,
                align,
            });
        }

        // SAFETY: caller guarantees ptr is a live tagged block of this alignment.
        let (mut slot, header) = unsafe { AllocHeader::read_checked(old, align) };
        if new_size <= header.size {
            /* shrink in place: the block already fits */
            // SAFETY: slot is the live header of `old`.
            unsafe { slot.as_mut().size = new_size };
            return Ok(old);
        }

        let new = self.allocate_tagged(new_size, align)?;
        // SAFETY: both blocks are live and distinct; old holds header.size
        // bytes, new holds new_size > header.size bytes.
        unsafe { ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), header.size) };
        // SAFETY: old is a live tagged block, released exactly once here.
        unsafe { self.release_tagged(old, align) };
        Ok(new)
    }

    #[track_caller]
    unsafe fn deallocate(&self, ptr: *mut u8, align: usize) {
        let Some(user) = NonNull::new(ptr) else {
            return;
        };
        if check_align(align).is_err() {
            trap::contract_violation(format_args!("{}", CrtError::UnsupportedAlignment(align)));
        }
        if self.needs_header(align) {
            // SAFETY: caller guarantees a live tagged block of this alignment.
            unsafe { self.release_tagged(user, align) };
        } else {
            // SAFETY: caller guarantees a live native block.
            unsafe { platform::release(user.as_ptr()) };
        }
    }
}

/* -------------------------------------------------------------------------- */
/*                          zero-sized global handle                          */
/* -------------------------------------------------------------------------- */

/// Zero-sized handle to the process heap. The default allocator of every
/// container; also usable as `#[global_allocator]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Heap;

// SAFETY: every call is forwarded to the singleton HeapHandle.
unsafe impl RawAlloc for Heap {
    #[inline]
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        handle().allocate(size, align)
    }

    #[inline]
    #[track_caller]
    unsafe fn reallocate(
        &self,
        ptr: *mut u8,
        new_size: usize,
        align: usize,
    ) -> Result<NonNull<u8>> {
        // SAFETY: caller's contract is forwarded as-is.
        unsafe { handle().reallocate(ptr, new_size, align) }
    }

    #[inline]
    #[track_caller]
    unsafe fn deallocate(&self, ptr: *mut u8, align: usize) {
        // SAFETY: caller's contract is forwarded as-is.
        unsafe { handle().deallocate(ptr, align) }
    }
}

// SAFETY: GlobalAlloc requires thread safety; the native heap is thread-safe
// and the handle is created through AtomicOnce. Failures become null as the
// trait demands. Layout guarantees a power-of-two alignment; ones above
// MAX_ALIGN are refused with null.
unsafe impl GlobalAlloc for Heap {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        match self.allocate(layout.size(), layout.align()) {
            Ok(ptr) => ptr.as_ptr(),
            Err(_) => ptr::null_mut(),
        }
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: GlobalAlloc callers pass the layout the block was allocated with.
        unsafe { self.deallocate(ptr, layout.align()) }
    }

    #[inline]
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: GlobalAlloc callers pass a live block and its original layout.
        match unsafe { self.reallocate(ptr, new_size, layout.align()) } {
            Ok(moved) => moved.as_ptr(),
            Err(_) => ptr::null_mut(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(ptr: NonNull<u8>, len: usize, seed: u8) {
        for i in 0..len {
            // SAFETY: tests only fill blocks they allocated with >= len bytes.
            unsafe { *ptr.as_ptr().add(i) = seed.wrapping_add(i as u8) };
        }
    }

    fn check(ptr: NonNull<u8>, len: usize, seed: u8) {
        for i in 0..len {
            // SAFETY: as in fill().
            let byte = unsafe { *ptr.as_ptr().add(i) };
            assert_eq!(byte, seed.wrapping_add(i as u8), "byte {} corrupted", i);
        }
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let a = initialize() as *const HeapHandle;
        let b = handle() as *const HeapHandle;
        assert_eq!(a, b);
        assert!(is_initialized());
        assert_eq!(handle().native_align(), platform::MIN_ALIGN);
    }

    #[test]
    fn test_default_alignment_round_trip() {
        let heap = Heap;
        let p = heap.allocate(24, 8).unwrap();
        assert_eq!(p.as_ptr() as usize % 8, 0);
        fill(p, 24, 1);
        check(p, 24, 1);
        // SAFETY: p is live with align 8.
        unsafe { heap.deallocate(p.as_ptr(), 8) };
    }

    #[test]
    fn test_over_aligned_blocks_are_aligned() {
        let heap = Heap;
        for align in [32usize, 64, 256, 4096] {
            for size in [0usize, 1, 15, 16, 100, 5000] {
                let p = heap.allocate(size, align).unwrap();
                assert_eq!(p.as_ptr() as usize % align, 0, "align {} size {}", align, size);
                fill(p, size, 7);
                check(p, size, 7);
                // SAFETY: p is live with this alignment.
                unsafe { heap.deallocate(p.as_ptr(), align) };
            }
        }
    }

    #[test]
    fn test_sixteen_is_tagged_only_when_native_is_smaller() {
        let h = handle();
        assert_eq!(h.needs_header(16), platform::MIN_ALIGN < 16);
        assert!(h.needs_header(32));
        assert!(!h.needs_header(1));
    }

    #[test]
    fn test_reallocate_native_preserves_contents() {
        let heap = Heap;
        let p = heap.allocate(16, 8).unwrap();
        fill(p, 16, 3);
        // SAFETY: p is live with align 8.
        let q = unsafe { heap.reallocate(p.as_ptr(), 4096, 8) }.unwrap();
        check(q, 16, 3);
        // SAFETY: q replaced p.
        let r = unsafe { heap.reallocate(q.as_ptr(), 4, 8) }.unwrap();
        check(r, 4, 3);
        // SAFETY: r is live.
        unsafe { heap.deallocate(r.as_ptr(), 8) };
    }

    #[test]
    fn test_reallocate_tagged_grow_and_shrink() {
        let heap = Heap;
        let p = heap.allocate(40, 64).unwrap();
        fill(p, 40, 9);
        // SAFETY: p is live with align 64.
        let q = unsafe { heap.reallocate(p.as_ptr(), 1000, 64) }.unwrap();
        assert_eq!(q.as_ptr() as usize % 64, 0);
        check(q, 40, 9);
        // SAFETY: q replaced p; shrinking keeps the block.
        let r = unsafe { heap.reallocate(q.as_ptr(), 10, 64) }.unwrap();
        assert_eq!(r, q);
        check(r, 10, 9);
        // SAFETY: r is live.
        unsafe { heap.deallocate(r.as_ptr(), 64) };
    }

    #[test]
    fn test_reallocate_null_allocates() {
        let heap = Heap;
        // SAFETY: null is allowed.
        let p = unsafe { heap.reallocate(ptr::null_mut(), 32, 128) }.unwrap();
        assert_eq!(p.as_ptr() as usize % 128, 0);
        // SAFETY: p is live with align 128.
        unsafe { heap.deallocate(p.as_ptr(), 128) };
    }

    #[test]
    fn test_deallocate_null_is_noop() {
        // SAFETY: null is a no-op for any alignment.
        unsafe {
            Heap.deallocate(ptr::null_mut(), 8);
        }
        // SAFETY: as above.
        unsafe {
            Heap.deallocate(ptr::null_mut(), 64);
        }
    }

    #[test]
    fn test_bad_alignment_rejected() {
        assert_eq!(
            Heap.allocate(8, 3),
            Err(CrtError::UnsupportedAlignment(3))
        );
        assert_eq!(
            Heap.allocate(8, MAX_ALIGN * 2),
            Err(CrtError::UnsupportedAlignment(MAX_ALIGN * 2))
        );
    }

    #[repr(C, align(64))]
    struct Arena([u8; 128]);

    #[test]
    #[should_panic(expected = "pointer was not allocated with alignment 64")]
    fn test_foreign_header_traps() {
        /* a user pointer whose header slot holds no sentinel */
        let mut arena = Arena([0xAB; 128]);
        let user = NonNull::new(arena.0.as_mut_ptr()).unwrap();
        // SAFETY: the byte 64 past the start is in bounds and 64-aligned.
        let user = unsafe { user.add(64) };
        // SAFETY: the 16 bytes below `user` belong to the arena, so the header
        // read is in bounds; the bogus tag must trap before anything is freed.
        let _ = unsafe { AllocHeader::read_checked(user, 64) };
    }

    #[test]
    fn test_tagged_block_carries_live_tag() {
        let p = Heap.allocate(8, 64).unwrap();
        // SAFETY: p is a live tagged block.
        let slot = unsafe { AllocHeader::slot_of(p) };
        // SAFETY: header is live while p is.
        assert_eq!(unsafe { slot.read() }.tag, ALIGNED_TAG);
        // SAFETY: p is live with align 64.
        unsafe { Heap.deallocate(p.as_ptr(), 64) };
    }

    /* a tagged header laid out by hand inside an arena, nothing to free */
    fn arena_with_header() -> (Arena, usize) {
        let mut arena = Arena([0; 128]);
        let user = NonNull::new(arena.0.as_mut_ptr()).unwrap();
        // SAFETY: 64 bytes in is inside the arena and 64-aligned.
        let user = unsafe { user.add(64) };
        // SAFETY: the header slot sits in the 64 bytes below user.
        unsafe {
            AllocHeader::slot_of(user).write(AllocHeader {
                size: 8,
                offset: 64,
                tag: ALIGNED_TAG,
            });
        }
        (arena, 64)
    }

    #[test]
    fn test_release_poisons_tag() {
        let (mut arena, at) = arena_with_header();
        // SAFETY: at is inside the arena.
        let user = unsafe { NonNull::new(arena.0.as_mut_ptr()).unwrap().add(at) };
        // SAFETY: the header below user was written by arena_with_header.
        let header = unsafe { AllocHeader::take_checked(user, 64) };
        assert_eq!(header.tag, ALIGNED_TAG);
        assert_eq!(header.size, 8);
        // SAFETY: as above.
        assert_eq!(unsafe { AllocHeader::slot_of(user).read() }.tag, RELEASED_TAG);
    }

    #[test]
    #[should_panic(expected = "pointer was not allocated with alignment 64")]
    fn test_second_release_traps() {
        let (mut arena, at) = arena_with_header();
        // SAFETY: at is inside the arena.
        let user = unsafe { NonNull::new(arena.0.as_mut_ptr()).unwrap().add(at) };
        // SAFETY: the header below user was written by arena_with_header.
        let _ = unsafe { AllocHeader::take_checked(user, 64) };
        // SAFETY: same header, now poisoned; must trap before anything else.
        let _ = unsafe { AllocHeader::take_checked(user, 64) };
    }

    #[test]
    fn test_global_alloc_interface() {
        let layout = Layout::from_size_align(48, 32).unwrap();
        // SAFETY: non-zero layout; released below with the same layout.
        let p = unsafe { Heap.alloc(layout) };
        assert!(!p.is_null());
        assert_eq!(p as usize % 32, 0);
        // SAFETY: p is live with `layout`.
        let q = unsafe { Heap.realloc(p, layout, 96) };
        assert!(!q.is_null());
        let new_layout = Layout::from_size_align(96, 32).unwrap();
        // SAFETY: q is live with new_layout's alignment.
        unsafe { Heap.dealloc(q, new_layout) };
    }

    #[test]
    fn test_concurrent_allocations() {
        std::thread::scope(|scope| {
            for t in 0..8u8 {
                scope.spawn(move || {
                    for round in 0..200usize {
                        let align = if round % 2 == 0 { 8 } else { 64 };
                        let size = 1 + (round * 7) % 300;
                        let p = Heap.allocate(size, align).unwrap();
                        fill(p, size, t);
                        check(p, size, t);
                        // SAFETY: p is live with `align`.
                        unsafe { Heap.deallocate(p.as_ptr(), align) };
                    }
                });
            }
        });
    }
}
