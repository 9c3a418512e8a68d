/*
 * trap.rs
 *
 * Fail-fast reporting. A contract violation or a heap that can't deliver
 * on an infallible path ends here: one line on stderr, then panic.
 * Release builds set panic=abort, so that panic is the abort.
 *
 * The stderr line comes first because a no_std host's panic handler may
 * print nothing at all.
 */

use core::fmt;

use crate::crt_eprintln;
use crate::error::CrtError;

/// Report a broken API contract and stop.
#[cold]
#[inline(never)]
#[track_caller]
pub fn contract_violation(args: fmt::Arguments<'_>) -> ! {
    crt_eprintln!("crtlib: contract violation: {}", args);
    panic!("contract violation: {}", args)
}

/// Report an allocation failure on a path that has no way to return it.
#[cold]
#[inline(never)]
#[track_caller]
pub fn alloc_failure(err: CrtError) -> ! {
    crt_eprintln!("crtlib: fatal: {}", err);
    panic!("fatal: {}", err)
}

/// Bounds check shared by every container. Always on.
#[inline]
#[track_caller]
pub fn check_index(index: usize, len: usize) {
    if index >= len {
        contract_violation(format_args!(
            "{}",
            CrtError::IndexOutOfBounds { index, len }
        ));
    }
}

/* unwrap for infallible container paths */
#[inline]
#[track_caller]
pub(crate) fn or_abort<T>(result: Result<T, CrtError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => alloc_failure(err),
    }
}
