/*
 * lib.rs
 *
 * Freestanding allocator and container core. No std, no alloc crate:
 * the only thing underneath is libc's malloc/realloc/free, reached
 * through the Heap singleton in heap.rs. Every container takes its
 * memory from a RawAlloc, Heap by default.
 *
 * Module order below is dependency order, leaves first.
 */

//! # crtlib
//!
//! A process-wide raw allocator plus three containers built directly on
//! it: a growable [`Array`], an open-addressing [`OpenMap`] (prime
//! capacity, double hashing, tombstones) and a small-buffer
//! [`SmallString`] that keeps up to 15 units inline.
//!
//! ## Quick Start
//!
//! ```rust
//! use crtlib::{Array, OpenMap, SmallString};
//!
//! let mut a = Array::from([1, 2, 3, 4, 5]);
//! a.erase(2);
//! assert_eq!(a, [1, 2, 4, 5]);
//!
//! let mut m: OpenMap<&str, i32> = OpenMap::new();
//! m.insert("a", 1);
//! assert_eq!(m.get("a"), Some(&1));
//! assert_eq!(m.capacity(), 13);
//!
//! let mut s = SmallString::from("hello");
//! assert!(s.is_inline());
//! s.resize(20);
//! assert!(!s.is_inline());
//! assert!(s.as_slice_with_nul().starts_with(b"hello"));
//! ```

#![no_std]

#[cfg(test)]
extern crate std;

pub mod config;
pub mod error;
pub mod io;
pub mod trap;
pub mod sync;
pub mod platform;
pub mod heap;
pub mod tracking;
pub mod hash;
pub mod prime;
mod buffer;
pub mod array;
pub mod map;
pub mod set;
pub mod string;

pub use array::Array;
pub use error::{CrtError, ErrorKind, Result};
pub use hash::{BuildFnv, Fnv1a};
pub use heap::{Heap, HeapHandle, RawAlloc};
pub use map::OpenMap;
pub use set::OpenSet;
pub use string::{BasicString, CodeUnit, SmallString, WideString};
pub use tracking::Tracking;
