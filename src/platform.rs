/*
 * platform.rs
 *
 * The native heap: libc malloc/realloc/free, nothing else.
 * Everything above this file goes through heap.rs; nothing above it calls
 * libc for memory directly.
 *
 * malloc only promises "suitably aligned for any fundamental type". That's
 * MIN_ALIGN below. Anything stricter is heap.rs's problem.
 */

/// Alignment every native block is guaranteed to have. Matches what glibc,
/// musl, macOS libmalloc and the Windows CRT hand out: two machine words
/// on 64-bit targets, 8 bytes on 32-bit ones.
#[cfg(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "riscv64",
    target_arch = "powerpc64",
    target_arch = "loongarch64",
    target_arch = "s390x",
    target_arch = "mips64",
))]
pub const MIN_ALIGN: usize = 16;

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "riscv64",
    target_arch = "powerpc64",
    target_arch = "loongarch64",
    target_arch = "s390x",
    target_arch = "mips64",
)))]
pub const MIN_ALIGN: usize = 8;

/// Request `size` bytes from the native heap. Null on failure.
///
/// # Safety
///
/// `size` must be non-zero; the result must be released with [`release`].
#[inline]
pub unsafe fn acquire(size: usize) -> *mut u8 {
    debug_assert!(size != 0, "zero-size native request");
    // SAFETY: malloc accepts any size and returns null on failure.
    unsafe { libc::malloc(size).cast() }
}

/// Resize a native block, moving it if needed. Null on failure, in which
/// case `ptr` is still valid and still owned by the caller.
///
/// # Safety
///
/// `ptr` must come from [`acquire`]/[`resize`] and not be released yet;
/// `new_size` must be non-zero.
#[inline]
pub unsafe fn resize(ptr: *mut u8, new_size: usize) -> *mut u8 {
    debug_assert!(new_size != 0, "zero-size native resize");
    // SAFETY: caller guarantees ptr is a live malloc block. realloc preserves
    // the first min(old, new) bytes and leaves ptr intact when it fails.
    unsafe { libc::realloc(ptr.cast(), new_size).cast() }
}

/// Return a native block. Null is accepted and ignored.
///
/// # Safety
///
/// `ptr` must be null or a live block from [`acquire`]/[`resize`].
#[inline]
pub unsafe fn release(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    // SAFETY: caller guarantees ptr is a live malloc block.
    unsafe { libc::free(ptr.cast()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_is_min_aligned() {
        for size in [1usize, 7, 16, 100, 4096] {
            // SAFETY: non-zero size, released below.
            let p = unsafe { acquire(size) };
            assert!(!p.is_null());
            assert_eq!(p as usize % MIN_ALIGN, 0, "size {} misaligned", size);
            // SAFETY: p came from acquire.
            unsafe { release(p) };
        }
    }

    #[test]
    fn test_resize_preserves_prefix() {
        // SAFETY: every pointer below comes from acquire/resize and is
        // released exactly once; writes stay inside the requested sizes.
        #[allow(clippy::multiple_unsafe_ops_per_block)]
        unsafe {
            let p = acquire(8);
            for i in 0..8 {
                *p.add(i) = i as u8 + 1;
            }
            let q = resize(p, 1024);
            assert!(!q.is_null());
            for i in 0..8 {
                assert_eq!(*q.add(i), i as u8 + 1);
            }
            release(q);
        }
    }

    #[test]
    fn test_release_null_is_noop() {
        // SAFETY: null is explicitly accepted.
        unsafe { release(core::ptr::null_mut()) };
    }
}
