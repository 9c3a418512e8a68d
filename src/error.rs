/*
 * error.rs
 *
 * Three kinds of failure, three treatments:
 * contract violations trap, exhaustion is an Err (or fatal on the
 * infallible paths), logical misses are Option::None and never get here.
 *
 * No String payloads. This crate is the allocator, it can't allocate
 * while reporting that allocation failed.
 */

use core::fmt;

/// Which bucket of the failure taxonomy an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller broke an API contract (bad index, bad alignment).
    ContractViolation,
    /// The heap could not satisfy a request, or sizes overflowed.
    ResourceExhaustion,
    /// Expected absence. Reported through `Option`, listed for completeness.
    LogicalMiss,
}

/* everything that can go wrong */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrtError {
    AllocFailed { size: usize, align: usize },
    UnsupportedAlignment(usize),
    CapacityOverflow,
    IndexOutOfBounds { index: usize, len: usize },
    AlignmentMismatch { align: usize },
}

impl fmt::Display for CrtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocFailed { size, align } => {
                write!(f, "allocation of {size} bytes (align {align}) failed")
            }
            Self::UnsupportedAlignment(align) => write!(f, "unsupported alignment: {align}"),
            Self::CapacityOverflow => write!(f, "capacity overflow"),
            Self::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds (len {len})")
            }
            Self::AlignmentMismatch { align } => {
                write!(f, "pointer was not allocated with alignment {align}")
            }
        }
    }
}

impl CrtError {
    /* map errors onto the taxonomy */
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AllocFailed { .. } | Self::CapacityOverflow => ErrorKind::ResourceExhaustion,
            Self::UnsupportedAlignment(_)
            | Self::IndexOutOfBounds { .. }
            | Self::AlignmentMismatch { .. } => ErrorKind::ContractViolation,
        }
    }
}

pub type Result<T> = core::result::Result<T, CrtError>;
