/*
 * io.rs
 *
 * no_std diagnostics. direct writes to stderr via libc::write.
 *
 * no buffering, no allocation - each write is a syscall. the callers are
 * traps and trace lines, both rare, and a trap may fire because the heap
 * is gone, so nothing here may touch the heap.
 */

use core::fmt::{self, Write};

/* file descriptor */
const STDERR: libc::c_int = 2;

/// Write bytes to stderr. Short writes and errors are dropped: there is
/// nowhere left to report them.
#[cfg(unix)]
#[inline]
pub fn write_stderr(s: &[u8]) {
    // SAFETY: s is a valid byte slice for s.len() bytes, STDERR is always a
    // valid descriptor number (write fails with EBADF if closed, which we ignore).
    unsafe {
        libc::write(STDERR, s.as_ptr().cast(), s.len());
    }
}

/* msvcrt takes an unsigned int count */
#[cfg(windows)]
#[inline]
pub fn write_stderr(s: &[u8]) {
    #[allow(clippy::cast_possible_truncation)]
    let count = s.len().min(libc::c_uint::MAX as usize) as libc::c_uint;
    // SAFETY: s is valid for at least `count` bytes, STDERR is a descriptor
    // number the CRT keeps open for the process lifetime.
    unsafe {
        libc::write(STDERR, s.as_ptr().cast(), count);
    }
}

/// `fmt::Write` sink over [`write_stderr`]. Each formatted piece becomes
/// its own syscall, so a trap message never needs a heap buffer.
pub struct StderrWriter;

impl Write for StderrWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        write_stderr(s.as_bytes());
        Ok(())
    }
}

/// Formatted diagnostic on stderr, no newline.
#[macro_export]
macro_rules! crt_eprint {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let _ = write!($crate::io::StderrWriter, $($arg)*);
    }};
}

/// Formatted diagnostic line on stderr.
#[macro_export]
macro_rules! crt_eprintln {
    () => {{
        $crate::io::write_stderr(b"\n");
    }};
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let _ = write!($crate::io::StderrWriter, $($arg)*);
        $crate::io::write_stderr(b"\n");
    }};
}

/// Trace line, only with the `trace` feature. Arguments are still
/// type-checked when the feature is off.
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {{
        if cfg!(feature = "trace") {
            $crate::crt_eprint!("crtlib[trace]: ");
            $crate::crt_eprintln!($($arg)*);
        }
    }};
}
