/*
 * string.rs
 *
 * Small-buffer string over code units (u8, u16, u32).
 *
 * Two storage modes, decided by whether the heap buffer has capacity:
 *
 *   inline: [C; 16] inside the struct, up to 15 units + NUL
 *   heap:   RawBuf<C, A>, power-of-two capacity >= len + 1
 *
 * Strings start inline and move to the heap once a sixteenth unit is
 * needed. They never move back, even when shortened. Either way the unit
 * at `len` is NUL, so as_ptr() is always a valid C string of the content
 * (interior NULs aside).
 *
 * Capacity counts slots including the terminator. Everything observable
 * (equality, ordering, hashing, search) looks at [0, len) only, so the
 * storage mode can't be told apart from outside.
 */

use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt::{self, Write};
use core::hash::{Hash, Hasher};
use core::ops::{Add, AddAssign, Bound, Deref, DerefMut, Index, IndexMut, RangeBounds};
use core::ptr;
use core::slice::{self, SliceIndex};
use core::str::Utf8Error;

use crate::buffer::RawBuf;
use crate::config::{GROWTH_FACTOR, INLINE_CAPACITY, MAX_INLINE_LEN};
use crate::error::{CrtError, Result};
use crate::heap::{Heap, RawAlloc};
use crate::{trace, trap};

/// A string element: plain old data with a NUL value.
pub trait CodeUnit: Copy + Eq + Ord + Hash + Default + fmt::Debug + 'static {
    const NUL: Self;

    /// ASCII whitespace: space, tab, LF, VT, FF, CR.
    fn is_space(self) -> bool;

    /// Decode `units` to chars, replacing anything malformed with U+FFFD.
    fn decode_lossy(units: &[Self], sink: &mut dyn FnMut(char) -> fmt::Result) -> fmt::Result;
}

#[inline]
fn ascii_space(unit: u32) -> bool {
    matches!(unit, 0x20 | 0x09..=0x0d)
}

impl CodeUnit for u8 {
    const NUL: Self = 0;

    #[inline]
    fn is_space(self) -> bool {
        ascii_space(u32::from(self))
    }

    fn decode_lossy(units: &[u8], sink: &mut dyn FnMut(char) -> fmt::Result) -> fmt::Result {
        for chunk in units.utf8_chunks() {
            for c in chunk.valid().chars() {
                sink(c)?;
            }
            if !chunk.invalid().is_empty() {
                sink(char::REPLACEMENT_CHARACTER)?;
            }
        }
        Ok(())
    }
}

impl CodeUnit for u16 {
    const NUL: Self = 0;

    #[inline]
    fn is_space(self) -> bool {
        ascii_space(u32::from(self))
    }

    fn decode_lossy(units: &[u16], sink: &mut dyn FnMut(char) -> fmt::Result) -> fmt::Result {
        for c in char::decode_utf16(units.iter().copied()) {
            sink(c.unwrap_or(char::REPLACEMENT_CHARACTER))?;
        }
        Ok(())
    }
}

impl CodeUnit for u32 {
    const NUL: Self = 0;

    #[inline]
    fn is_space(self) -> bool {
        ascii_space(self)
    }

    fn decode_lossy(units: &[u32], sink: &mut dyn FnMut(char) -> fmt::Result) -> fmt::Result {
        for &unit in units {
            sink(char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER))?;
        }
        Ok(())
    }
}

/// Small-buffer string of `C` units.
pub struct BasicString<C: CodeUnit, A: RawAlloc = Heap> {
    inline: [C; INLINE_CAPACITY],
    /* capacity 0 means inline mode */
    heap: RawBuf<C, A>,
    len: usize,
}

/// Byte string.
pub type SmallString<A = Heap> = BasicString<u8, A>;

/// UTF-16 string.
pub type WideString<A = Heap> = BasicString<u16, A>;

impl<C: CodeUnit> BasicString<C, Heap> {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::new_in(Heap)
    }

    /// Copy of `units`. Up to 15 units stay inline.
    #[must_use]
    #[track_caller]
    pub fn from_units(units: &[C]) -> Self {
        Self::from_units_in(units, Heap)
    }

    /// `n` copies of `unit`.
    #[must_use]
    #[track_caller]
    pub fn from_elem(n: usize, unit: C) -> Self {
        let mut s = Self::new();
        s.resize_with(n, unit);
        s
    }

    /// Units of `units` up to (not including) the first NUL, or all of
    /// them if there is none.
    #[must_use]
    #[track_caller]
    pub fn from_c_units(units: &[C]) -> Self {
        let end = units.iter().position(|&u| u == C::NUL).unwrap_or(units.len());
        Self::from_units(&units[..end])
    }
}

impl<C: CodeUnit, A: RawAlloc> BasicString<C, A> {
    #[inline]
    pub const fn new_in(alloc: A) -> Self {
        Self {
            inline: [C::NUL; INLINE_CAPACITY],
            heap: RawBuf::new_in(alloc),
            len: 0,
        }
    }

    #[track_caller]
    pub fn from_units_in(units: &[C], alloc: A) -> Self {
        let mut s = Self::new_in(alloc);
        s.append(units);
        s
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_inline(&self) -> bool {
        self.heap.capacity() == 0
    }

    /// Slots available, terminator included: 16 while inline.
    #[inline]
    pub fn capacity(&self) -> usize {
        if self.is_inline() {
            INLINE_CAPACITY
        } else {
            self.heap.capacity()
        }
    }

    #[inline]
    pub fn allocator(&self) -> &A {
        self.heap.allocator()
    }

    /// Pointer to the NUL-terminated content. Valid until the string is
    /// moved or modified.
    #[inline]
    pub fn as_ptr(&self) -> *const C {
        if self.is_inline() {
            self.inline.as_ptr()
        } else {
            self.heap.as_ptr()
        }
    }

    #[inline]
    fn as_mut_ptr(&mut self) -> *mut C {
        if self.is_inline() {
            self.inline.as_mut_ptr()
        } else {
            self.heap.as_ptr()
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[C] {
        // SAFETY: [0, len) is initialized in either mode.
        unsafe { slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [C] {
        let len = self.len;
        // SAFETY: as for as_slice, with exclusive access.
        unsafe { slice::from_raw_parts_mut(self.as_mut_ptr(), len) }
    }

    /// Content plus its terminator.
    #[inline]
    pub fn as_slice_with_nul(&self) -> &[C] {
        // SAFETY: the terminator at len is always written.
        unsafe { slice::from_raw_parts(self.as_ptr(), self.len + 1) }
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<C> {
        self.as_slice().get(index).copied()
    }

    #[inline]
    pub fn front(&self) -> Option<C> {
        self.as_slice().first().copied()
    }

    #[inline]
    pub fn back(&self) -> Option<C> {
        self.as_slice().last().copied()
    }

    /* ---------------------------------------------------------------------- */
    /*                                capacity                                */
    /* ---------------------------------------------------------------------- */

    /* make capacity >= slots, doubling from the current capacity */
    fn try_grow_to(&mut self, slots: usize) -> Result<()> {
        let cap = self.capacity();
        if slots <= cap {
            return Ok(());
        }
        let mut target = cap;
        while target < slots {
            target = target
                .checked_mul(GROWTH_FACTOR)
                .ok_or(CrtError::CapacityOverflow)?;
        }
        self.try_move_to(target)
    }

    /* switch to heap storage of `target` slots, or grow the heap buffer */
    fn try_move_to(&mut self, target: usize) -> Result<()> {
        if self.is_inline() {
            self.heap.try_set_capacity(target)?;
            // SAFETY: the new buffer holds target > len slots; inline content
            // and terminator are len + 1 units.
            unsafe {
                ptr::copy_nonoverlapping(self.inline.as_ptr(), self.heap.as_ptr(), self.len + 1);
            }
            trace!("string spilled to heap: len {}, capacity {}", self.len, target);
        } else {
            self.heap.try_set_capacity(target)?;
        }
        Ok(())
    }

    /// Room for `n` units plus the terminator. Capacity becomes a power
    /// of two; inline content moves to the heap if it has to.
    pub fn try_reserve(&mut self, n: usize) -> Result<()> {
        let slots = n.checked_add(1).ok_or(CrtError::CapacityOverflow)?;
        if slots <= self.capacity() {
            return Ok(());
        }
        let target = slots
            .checked_next_power_of_two()
            .ok_or(CrtError::CapacityOverflow)?;
        self.try_move_to(target)
    }

    #[track_caller]
    pub fn reserve(&mut self, n: usize) {
        trap::or_abort(self.try_reserve(n));
    }

    #[inline]
    #[track_caller]
    fn grow_to(&mut self, slots: usize) {
        trap::or_abort(self.try_grow_to(slots));
    }

    #[inline]
    fn set_len(&mut self, len: usize) {
        self.len = len;
        // SAFETY: every caller has ensured capacity > len.
        unsafe { self.as_mut_ptr().add(len).write(C::NUL) };
    }

    /* ---------------------------------------------------------------------- */
    /*                               mutation                                 */
    /* ---------------------------------------------------------------------- */

    /// Resize to `n` units. Shrinking only moves the terminator; growing
    /// fills with NUL.
    #[track_caller]
    pub fn resize(&mut self, n: usize) {
        self.resize_with(n, C::NUL);
    }

    /// Resize to `n` units, filling new ones with `unit`.
    #[track_caller]
    pub fn resize_with(&mut self, n: usize, unit: C) {
        if n > self.len {
            let slots = trap::or_abort(n.checked_add(1).ok_or(CrtError::CapacityOverflow));
            self.grow_to(slots);
            let base = self.as_mut_ptr();
            for i in self.len..n {
                // SAFETY: i < n < capacity.
                unsafe { base.add(i).write(unit) };
            }
        }
        self.set_len(n);
    }

    #[track_caller]
    pub fn push_back(&mut self, unit: C) {
        self.grow_to(self.len + 2);
        let len = self.len;
        // SAFETY: capacity >= len + 2 leaves room for the unit and the NUL.
        unsafe { self.as_mut_ptr().add(len).write(unit) };
        self.set_len(len + 1);
    }

    pub fn pop_back(&mut self) -> Option<C> {
        let last = self.back()?;
        self.set_len(self.len - 1);
        Some(last)
    }

    /// Insert `unit` before `pos`. `pos >= len` appends.
    #[track_caller]
    pub fn insert(&mut self, pos: usize, unit: C) {
        self.insert_units(pos, slice::from_ref(&unit));
    }

    /// Insert `units` before `pos`, clamped to `len`.
    #[track_caller]
    pub fn insert_units(&mut self, pos: usize, units: &[C]) {
        if units.is_empty() {
            return;
        }
        let pos = pos.min(self.len);
        let len = self.len;
        let count = units.len();
        let slots = trap::or_abort(
            len.checked_add(count)
                .and_then(|n| n.checked_add(1))
                .ok_or(CrtError::CapacityOverflow),
        );
        self.grow_to(slots);
        let base = self.as_mut_ptr();
        // SAFETY: capacity >= len + count + 1. The tail [pos, len] (with the
        // NUL) moves up by count, then units fill the gap; units cannot alias
        // self while we hold &mut self.
        unsafe {
            ptr::copy(base.add(pos), base.add(pos + count), len - pos + 1);
            ptr::copy_nonoverlapping(units.as_ptr(), base.add(pos), count);
        }
        self.len = len + count;
    }

    #[track_caller]
    pub fn append(&mut self, units: &[C]) {
        self.insert_units(self.len, units);
    }

    /// Remove the unit at `pos`. Returns `pos`.
    #[track_caller]
    pub fn erase(&mut self, pos: usize) -> usize {
        trap::check_index(pos, self.len);
        self.erase_range(pos..=pos)
    }

    /// Remove the units in `range`. Returns the range start.
    #[track_caller]
    pub fn erase_range<R: RangeBounds<usize>>(&mut self, range: R) -> usize {
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => self.len,
        };
        if start > end || end > self.len {
            trap::contract_violation(format_args!(
                "erase range {}..{} out of bounds (len {})",
                start, end, self.len
            ));
        }
        let len = self.len;
        let base = self.as_mut_ptr();
        // SAFETY: [end, len] including the NUL lies inside the buffer and
        // moves down to start.
        unsafe { ptr::copy(base.add(end), base.add(start), len - end + 1) };
        self.len = len - (end - start);
        start
    }

    /// Drop the content. Capacity and storage mode are kept.
    pub fn clear(&mut self) {
        self.set_len(0);
    }

    /* ---------------------------------------------------------------------- */
    /*                                 search                                 */
    /* ---------------------------------------------------------------------- */

    pub fn starts_with(&self, prefix: &[C]) -> bool {
        self.as_slice().starts_with(prefix)
    }

    pub fn ends_with(&self, suffix: &[C]) -> bool {
        self.as_slice().ends_with(suffix)
    }

    /// First occurrence of `needle` at or after `from`. An empty needle
    /// matches at `from` when `from <= len`.
    pub fn find(&self, needle: &[C], from: usize) -> Option<usize> {
        let hay = self.as_slice().get(from..)?;
        if needle.is_empty() {
            return Some(from);
        }
        hay.windows(needle.len())
            .position(|window| window == needle)
            .map(|i| i + from)
    }

    pub fn find_unit(&self, unit: C) -> Option<usize> {
        self.as_slice().iter().position(|&u| u == unit)
    }

    pub fn contains(&self, needle: &[C]) -> bool {
        self.find(needle, 0).is_some()
    }

    /// Copy without leading whitespace.
    pub fn trim_start(&self) -> Self
    where
        A: Clone,
    {
        let units = self.as_slice();
        let start = units.iter().position(|u| !u.is_space()).unwrap_or(units.len());
        Self::from_units_in(&units[start..], self.allocator().clone())
    }

    /// Copy without trailing whitespace.
    pub fn trim_end(&self) -> Self
    where
        A: Clone,
    {
        let units = self.as_slice();
        let end = units.iter().rposition(|u| !u.is_space()).map_or(0, |i| i + 1);
        Self::from_units_in(&units[..end], self.allocator().clone())
    }

    /// Copy without leading or trailing whitespace.
    pub fn trim(&self) -> Self
    where
        A: Clone,
    {
        let units = self.as_slice();
        let start = units.iter().position(|u| !u.is_space()).unwrap_or(units.len());
        let end = units.iter().rposition(|u| !u.is_space()).map_or(start, |i| i + 1);
        Self::from_units_in(&units[start..end], self.allocator().clone())
    }
}

/* -------------------------------------------------------------------------- */
/*                              byte strings                                  */
/* -------------------------------------------------------------------------- */

impl<A: RawAlloc> BasicString<u8, A> {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.as_slice()
    }

    pub fn to_str(&self) -> core::result::Result<&str, Utf8Error> {
        core::str::from_utf8(self.as_slice())
    }

    #[track_caller]
    pub fn push_str(&mut self, s: &str) {
        self.append(s.as_bytes());
    }
}

impl From<&str> for SmallString {
    fn from(s: &str) -> Self {
        Self::from_units(s.as_bytes())
    }
}

impl From<&str> for WideString {
    fn from(s: &str) -> Self {
        s.encode_utf16().collect()
    }
}

impl From<&str> for BasicString<u32> {
    fn from(s: &str) -> Self {
        s.chars().map(u32::from).collect()
    }
}

impl<A: RawAlloc> Write for BasicString<u8, A> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.try_reserve(self.len + s.len()).map_err(|_| fmt::Error)?;
        self.append(s.as_bytes());
        Ok(())
    }
}

impl<A: RawAlloc> PartialEq<str> for BasicString<u8, A> {
    fn eq(&self, other: &str) -> bool {
        self.as_slice() == other.as_bytes()
    }
}

impl<A: RawAlloc> PartialEq<&str> for BasicString<u8, A> {
    fn eq(&self, other: &&str) -> bool {
        self.as_slice() == other.as_bytes()
    }
}

impl<A: RawAlloc> AddAssign<&str> for BasicString<u8, A> {
    #[track_caller]
    fn add_assign(&mut self, rhs: &str) {
        self.push_str(rhs);
    }
}

impl<A: RawAlloc> Add<&str> for BasicString<u8, A> {
    type Output = Self;

    #[track_caller]
    fn add(mut self, rhs: &str) -> Self {
        self.push_str(rhs);
        self
    }
}

/* -------------------------------------------------------------------------- */
/*                              trait impls                                   */
/* -------------------------------------------------------------------------- */

impl<C: CodeUnit, A: RawAlloc> AddAssign<&[C]> for BasicString<C, A> {
    #[track_caller]
    fn add_assign(&mut self, rhs: &[C]) {
        self.append(rhs);
    }
}

impl<C: CodeUnit, A: RawAlloc> AddAssign<C> for BasicString<C, A> {
    #[track_caller]
    fn add_assign(&mut self, rhs: C) {
        self.push_back(rhs);
    }
}

impl<C: CodeUnit, A: RawAlloc, B: RawAlloc> AddAssign<&BasicString<C, B>> for BasicString<C, A> {
    #[track_caller]
    fn add_assign(&mut self, rhs: &BasicString<C, B>) {
        self.append(rhs.as_slice());
    }
}

impl<C: CodeUnit, A: RawAlloc> Add<&[C]> for BasicString<C, A> {
    type Output = Self;

    #[track_caller]
    fn add(mut self, rhs: &[C]) -> Self {
        self.append(rhs);
        self
    }
}

impl<C: CodeUnit, A: RawAlloc, B: RawAlloc> Add<&BasicString<C, B>> for BasicString<C, A> {
    type Output = Self;

    #[track_caller]
    fn add(mut self, rhs: &BasicString<C, B>) -> Self {
        self.append(rhs.as_slice());
        self
    }
}

impl<C: CodeUnit, A: RawAlloc + Clone> Clone for BasicString<C, A> {
    /// Deep copy; storage mode follows the length, not the source.
    fn clone(&self) -> Self {
        Self::from_units_in(self.as_slice(), self.allocator().clone())
    }
}

impl<C: CodeUnit> Default for BasicString<C, Heap> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CodeUnit, A: RawAlloc> fmt::Display for BasicString<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        C::decode_lossy(self.as_slice(), &mut |c| f.write_char(c))
    }
}

impl<C: CodeUnit, A: RawAlloc> fmt::Debug for BasicString<C, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('"')?;
        C::decode_lossy(self.as_slice(), &mut |c| {
            for escaped in c.escape_debug() {
                f.write_char(escaped)?;
            }
            Ok(())
        })?;
        f.write_char('"')
    }
}

impl<C: CodeUnit, A: RawAlloc, B: RawAlloc> PartialEq<BasicString<C, B>> for BasicString<C, A> {
    fn eq(&self, other: &BasicString<C, B>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<C: CodeUnit, A: RawAlloc> Eq for BasicString<C, A> {}

impl<C: CodeUnit, A: RawAlloc> PartialEq<[C]> for BasicString<C, A> {
    fn eq(&self, other: &[C]) -> bool {
        self.as_slice() == other
    }
}

impl<C: CodeUnit, A: RawAlloc> PartialOrd for BasicString<C, A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C: CodeUnit, A: RawAlloc> Ord for BasicString<C, A> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl<C: CodeUnit, A: RawAlloc> Hash for BasicString<C, A> {
    /// Same as hashing the `[C]` content, so `Borrow<[C]>` lookups agree.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl<C: CodeUnit, A: RawAlloc> Borrow<[C]> for BasicString<C, A> {
    fn borrow(&self) -> &[C] {
        self.as_slice()
    }
}

impl<C: CodeUnit, A: RawAlloc> Deref for BasicString<C, A> {
    type Target = [C];

    #[inline]
    fn deref(&self) -> &[C] {
        self.as_slice()
    }
}

impl<C: CodeUnit, A: RawAlloc> DerefMut for BasicString<C, A> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [C] {
        self.as_mut_slice()
    }
}

impl<C: CodeUnit, I: SliceIndex<[C]>, A: RawAlloc> Index<I> for BasicString<C, A> {
    type Output = I::Output;

    #[inline]
    #[track_caller]
    fn index(&self, index: I) -> &I::Output {
        Index::index(self.as_slice(), index)
    }
}

impl<C: CodeUnit, I: SliceIndex<[C]>, A: RawAlloc> IndexMut<I> for BasicString<C, A> {
    #[inline]
    #[track_caller]
    fn index_mut(&mut self, index: I) -> &mut I::Output {
        IndexMut::index_mut(self.as_mut_slice(), index)
    }
}

impl<C: CodeUnit, A: RawAlloc> Extend<C> for BasicString<C, A> {
    fn extend<I: IntoIterator<Item = C>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.reserve(self.len.saturating_add(lower));
        for unit in iter {
            self.push_back(unit);
        }
    }
}

impl<'a, C: CodeUnit, A: RawAlloc> Extend<&'a C> for BasicString<C, A> {
    fn extend<I: IntoIterator<Item = &'a C>>(&mut self, iter: I) {
        self.extend(iter.into_iter().copied());
    }
}

impl<C: CodeUnit> FromIterator<C> for BasicString<C, Heap> {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        let mut s = Self::new();
        s.extend(iter);
        s
    }
}

const _: () = assert!(MAX_INLINE_LEN + 1 == INLINE_CAPACITY);
