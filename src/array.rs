/*
 * array.rs
 *
 * Growable contiguous array over a RawAlloc.
 *
 * Layout: RawBuf holds `capacity` slots, the first `len` are live.
 * Growth doubles from MIN_ARRAY_CAPACITY; reserve rounds up to a power of
 * two. Capacity never shrinks except by dropping the array.
 *
 * Element moves are bitwise (ptr::copy). Anything that runs user code
 * mid-operation (clone, drop) does so with `len` covering only slots that
 * are initialized, so a panic leaks at worst and never double-drops.
 */

use core::fmt;
use core::hash::{Hash, Hasher};
use core::iter::FusedIterator;
use core::mem::{self, ManuallyDrop};
use core::ops::{Bound, Deref, DerefMut, Index, IndexMut, RangeBounds};
use core::ptr;
use core::slice::{self, SliceIndex};

use crate::buffer::RawBuf;
use crate::config::{GROWTH_FACTOR, MIN_ARRAY_CAPACITY};
use crate::error::{CrtError, Result};
use crate::heap::{Heap, RawAlloc};
use crate::trap;

/// Growable array. `Array<T>` uses the process heap.
pub struct Array<T, A: RawAlloc = Heap> {
    buf: RawBuf<T, A>,
    len: usize,
}

impl<T> Array<T, Heap> {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::new_in(Heap)
    }

    /// Empty array with room for at least `n` elements (rounded up to a
    /// power of two).
    #[must_use]
    #[track_caller]
    pub fn with_capacity(n: usize) -> Self {
        Self::with_capacity_in(n, Heap)
    }

    /// `n` clones of `value`.
    #[must_use]
    pub fn from_elem(n: usize, value: T) -> Self
    where
        T: Clone,
    {
        Self::from_elem_in(n, value, Heap)
    }

    #[must_use]
    pub fn from_slice(src: &[T]) -> Self
    where
        T: Clone,
    {
        let mut array = Self::new();
        array.insert_slice(0, src);
        array
    }

    /// Bitwise copy of `src`.
    #[must_use]
    pub fn from_copy_slice(src: &[T]) -> Self
    where
        T: Copy,
    {
        let mut array = Self::new();
        array.insert_copy_slice(0, src);
        array
    }
}

impl<T, A: RawAlloc> Array<T, A> {
    #[inline]
    pub const fn new_in(alloc: A) -> Self {
        Self {
            buf: RawBuf::new_in(alloc),
            len: 0,
        }
    }

    #[track_caller]
    pub fn with_capacity_in(n: usize, alloc: A) -> Self {
        let mut array = Self::new_in(alloc);
        array.reserve(n);
        array
    }

    pub fn from_elem_in(n: usize, value: T, alloc: A) -> Self
    where
        T: Clone,
    {
        let mut array = Self::with_capacity_in(n, alloc);
        if n == 0 {
            return array;
        }
        for _ in 1..n {
            array.push_back(value.clone());
        }
        array.push_back(value);
        array
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
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    #[inline]
    pub fn allocator(&self) -> &A {
        self.buf.allocator()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the first len slots are initialized; the pointer is non-null
        // and aligned even when nothing is allocated.
        unsafe { slice::from_raw_parts(self.buf.as_ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as for as_slice, and &mut self gives exclusive access.
        unsafe { slice::from_raw_parts_mut(self.buf.as_ptr(), self.len) }
    }

    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.buf.as_ptr()
    }

    /* ---------------------------------------------------------------------- */
    /*                                capacity                                */
    /* ---------------------------------------------------------------------- */

    /// Make room for at least `n` elements in total. No-op if the
    /// capacity already suffices; otherwise capacity becomes the next
    /// power of two `>= n`.
    pub fn try_reserve(&mut self, n: usize) -> Result<()> {
        if n <= self.capacity() {
            return Ok(());
        }
        let target = n
            .checked_next_power_of_two()
            .ok_or(CrtError::CapacityOverflow)?;
        self.buf.try_set_capacity(target)
    }

    /// [`Array::try_reserve`], fatal on failure.
    #[track_caller]
    pub fn reserve(&mut self, n: usize) {
        trap::or_abort(self.try_reserve(n));
    }

    fn try_grow(&mut self) -> Result<()> {
        let cap = self.capacity();
        let target = if cap == 0 {
            MIN_ARRAY_CAPACITY
        } else {
            cap.checked_mul(GROWTH_FACTOR)
                .ok_or(CrtError::CapacityOverflow)?
        };
        self.buf.try_set_capacity(target)
    }

    #[inline]
    #[track_caller]
    fn grow_if_full(&mut self) {
        if self.len == self.capacity() {
            trap::or_abort(self.try_grow());
        }
    }

    /* ---------------------------------------------------------------------- */
    /*                              push / pop                                */
    /* ---------------------------------------------------------------------- */

    #[track_caller]
    pub fn push_back(&mut self, value: T) {
        self.grow_if_full();
        // SAFETY: len < capacity after growing, slot len is unused.
        unsafe { self.buf.slot(self.len).write(value) };
        self.len += 1;
    }

    /// Construct an element in place at the end and return it.
    #[track_caller]
    pub fn emplace_back<F: FnOnce() -> T>(&mut self, make: F) -> &mut T {
        self.grow_if_full();
        let slot = self.buf.slot(self.len);
        // SAFETY: slot len is unused and inside the buffer.
        unsafe { slot.write(make()) };
        self.len += 1;
        // SAFETY: just initialized; borrow is tied to &mut self.
        unsafe { &mut *slot }
    }

    pub fn pop_back(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: slot len was live and is now outside the array.
        Some(unsafe { self.buf.slot(self.len).read() })
    }

    pub fn back(&self) -> Option<&T> {
        self.as_slice().last()
    }

    pub fn front(&self) -> Option<&T> {
        self.as_slice().first()
    }

    /* ---------------------------------------------------------------------- */
    /*                                insert                                  */
    /* ---------------------------------------------------------------------- */

    /// Insert `value` before position `index`, shifting the tail up.
    /// `index == len` appends. `index > len` is an error.
    pub fn try_insert(&mut self, index: usize, value: T) -> Result<()> {
        if index > self.len {
            return Err(CrtError::IndexOutOfBounds {
                index,
                len: self.len,
            });
        }
        if self.len == self.capacity() {
            self.try_grow()?;
        }
        let hole = self.buf.slot(index);
        // SAFETY: capacity > len, so [index, len) moved up one stays in the
        // buffer; ptr::copy handles the overlap.
        unsafe {
            ptr::copy(hole, hole.add(1), self.len - index);
        }
        // SAFETY: the hole's old value was moved out by the copy above.
        unsafe { hole.write(value) };
        self.len += 1;
        Ok(())
    }

    /// [`Array::try_insert`]; an out-of-range index is a contract
    /// violation, exhaustion is fatal.
    #[track_caller]
    pub fn insert(&mut self, index: usize, value: T) {
        match self.try_insert(index, value) {
            Ok(()) => {}
            Err(err @ CrtError::IndexOutOfBounds { .. }) => {
                trap::contract_violation(format_args!("insert: {}", err))
            }
            Err(err) => trap::alloc_failure(err),
        }
    }

    /* opens `count` uninitialized slots at index; len is left at index */
    #[track_caller]
    fn open_gap(&mut self, index: usize, count: usize) -> usize {
        if index > self.len {
            trap::contract_violation(format_args!(
                "insert: {}",
                CrtError::IndexOutOfBounds {
                    index,
                    len: self.len
                }
            ));
        }
        let total = trap::or_abort(self.len.checked_add(count).ok_or(CrtError::CapacityOverflow));
        self.reserve(total);
        let tail = self.len - index;
        let src = self.buf.slot(index);
        // SAFETY: total <= capacity, so the shifted tail fits. The gap is now
        // logically uninitialized and len excludes both gap and tail until
        // the caller fills the gap.
        unsafe {
            ptr::copy(src, src.add(count), tail);
        }
        self.len = index;
        tail
    }

    /* closes the gap opened by open_gap once it is filled */
    #[inline]
    fn close_gap(&mut self, index: usize, count: usize, tail: usize) {
        self.len = index + count + tail;
    }

    /// Insert clones of `src` before `index`.
    #[track_caller]
    pub fn insert_slice(&mut self, index: usize, src: &[T])
    where
        T: Clone,
    {
        if src.is_empty() {
            if index > self.len {
                trap::check_index(index, self.len);
            }
            return;
        }
        let tail = self.open_gap(index, src.len());
        for (i, item) in src.iter().enumerate() {
            // SAFETY: index + i lies inside the gap open_gap reserved.
            unsafe { self.buf.slot(index + i).write(item.clone()) };
        }
        self.close_gap(index, src.len(), tail);
    }

    /// Insert a bitwise copy of `src` before `index`.
    #[track_caller]
    pub fn insert_copy_slice(&mut self, index: usize, src: &[T])
    where
        T: Copy,
    {
        if src.is_empty() {
            if index > self.len {
                trap::check_index(index, self.len);
            }
            return;
        }
        let tail = self.open_gap(index, src.len());
        // SAFETY: the gap holds exactly src.len() slots and src cannot alias
        // self while we hold &mut self.
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), self.buf.slot(index), src.len());
        }
        self.close_gap(index, src.len(), tail);
    }

    /// Insert clones of every element of `other` before `index`.
    #[track_caller]
    pub fn insert_array<B: RawAlloc>(&mut self, index: usize, other: &Array<T, B>)
    where
        T: Clone,
    {
        self.insert_slice(index, other.as_slice());
    }

    /* ---------------------------------------------------------------------- */
    /*                                 erase                                  */
    /* ---------------------------------------------------------------------- */

    /// Remove and return the element at `index`, shifting the tail down.
    #[track_caller]
    pub fn remove(&mut self, index: usize) -> T {
        trap::check_index(index, self.len);
        let hole = self.buf.slot(index);
        // SAFETY: index < len, so the slot is live; after the read it is
        // moved-from and the tail copy overwrites it.
        unsafe {
            let value = hole.read();
            ptr::copy(hole.add(1), hole, self.len - index - 1);
            self.len -= 1;
            value
        }
    }

    /// Destroy the element at `index`, preserving order. Returns `index`,
    /// which now names the element that followed (or `len`).
    #[track_caller]
    pub fn erase(&mut self, index: usize) -> usize {
        drop(self.remove(index));
        index
    }

    /// Destroy the elements in `range`, preserving order. Returns the
    /// range start.
    #[track_caller]
    pub fn erase_range<R: RangeBounds<usize>>(&mut self, range: R) -> usize {
        let (start, end) = self.resolve(range);
        let old_len = self.len;
        self.len = start;
        // SAFETY: [start, end) is live and now outside len, so a panicking
        // destructor leaks the tail rather than dropping anything twice.
        unsafe {
            drop_range(self.buf.slot(start), end - start);
        }
        let tail = old_len - end;
        // SAFETY: moves the live tail down over the destroyed slots.
        unsafe {
            ptr::copy(self.buf.slot(end), self.buf.slot(start), tail);
        }
        self.len = start + tail;
        start
    }

    /// Remove the first element equal to `value`. Returns whether one was.
    pub fn erase_value(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        match self.position(value) {
            Some(index) => {
                self.erase(index);
                true
            }
            None => false,
        }
    }

    /// Remove and return the element at `index`, moving the last element
    /// into its place. O(1), does not preserve order.
    #[track_caller]
    pub fn swap_remove(&mut self, index: usize) -> T {
        trap::check_index(index, self.len);
        let last = self.len - 1;
        self.as_mut_slice().swap(index, last);
        self.len = last;
        // SAFETY: slot `last` holds the target after the swap and is now
        // outside len.
        unsafe { self.buf.slot(last).read() }
    }

    /// Destroy the element at `index` by swapping the last one in.
    /// Returns `index`.
    #[track_caller]
    pub fn unstable_erase(&mut self, index: usize) -> usize {
        drop(self.swap_remove(index));
        index
    }

    /// Unordered removal of the first element equal to `value`.
    pub fn unstable_erase_value(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        match self.position(value) {
            Some(index) => {
                self.unstable_erase(index);
                true
            }
            None => false,
        }
    }

    /// Destroy all elements. Capacity is kept.
    pub fn clear(&mut self) {
        let len = self.len;
        self.len = 0;
        // SAFETY: the first len slots were live and are now outside the array.
        unsafe {
            drop_range(self.buf.slot(0), len);
        }
    }

    /// Shorten to `n` elements; no-op when already shorter.
    pub fn truncate(&mut self, n: usize) {
        if n < self.len {
            self.erase_range(n..);
        }
    }

    /* ---------------------------------------------------------------------- */
    /*                                search                                  */
    /* ---------------------------------------------------------------------- */

    pub fn position(&self, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.as_slice().iter().position(|item| item == value)
    }

    pub fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.position(value).is_some()
    }

    #[track_caller]
    fn resolve<R: RangeBounds<usize>>(&self, range: R) -> (usize, usize) {
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
        (start, end)
    }
}

/* destroy `count` values starting at `first`; trivial types skip the loop */
#[inline]
unsafe fn drop_range<T>(first: *mut T, count: usize) {
    if mem::needs_drop::<T>() && count > 0 {
        // SAFETY: the caller guarantees [first, first + count) is live and
        // will not be read again.
        unsafe { ptr::drop_in_place(ptr::slice_from_raw_parts_mut(first, count)) }
    }
}

impl<T, A: RawAlloc> Drop for Array<T, A> {
    fn drop(&mut self) {
        // SAFETY: the first len slots are live; RawBuf frees the memory after.
        unsafe { drop_range(self.buf.slot(0), self.len) }
    }
}

impl<T, A: RawAlloc> Deref for Array<T, A> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, A: RawAlloc> DerefMut for Array<T, A> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T, I: SliceIndex<[T]>, A: RawAlloc> Index<I> for Array<T, A> {
    type Output = I::Output;

    #[inline]
    #[track_caller]
    fn index(&self, index: I) -> &I::Output {
        Index::index(self.as_slice(), index)
    }
}

impl<T, I: SliceIndex<[T]>, A: RawAlloc> IndexMut<I> for Array<T, A> {
    #[inline]
    #[track_caller]
    fn index_mut(&mut self, index: I) -> &mut I::Output {
        IndexMut::index_mut(self.as_mut_slice(), index)
    }
}

/* ---------------------------------------------------------------------- */
/*                             value semantics                            */
/* ---------------------------------------------------------------------- */

impl<T: Clone, A: RawAlloc + Clone> Clone for Array<T, A> {
    /// Independent copy with the same capacity.
    fn clone(&self) -> Self {
        let mut copy = Self::new_in(self.allocator().clone());
        copy.buf.set_capacity(self.capacity());
        for item in self.as_slice() {
            // SAFETY: copy.capacity() == self.capacity() >= self.len.
            unsafe { copy.buf.slot(copy.len).write(item.clone()) };
            copy.len += 1;
        }
        copy
    }
}

impl<T> Default for Array<T, Heap> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug, A: RawAlloc> fmt::Debug for Array<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T, U, A, B> PartialEq<Array<U, B>> for Array<T, A>
where
    T: PartialEq<U>,
    A: RawAlloc,
    B: RawAlloc,
{
    fn eq(&self, other: &Array<U, B>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, A: RawAlloc> Eq for Array<T, A> {}

impl<T, U: PartialEq<T>, A: RawAlloc, const N: usize> PartialEq<Array<T, A>> for [U; N] {
    fn eq(&self, other: &Array<T, A>) -> bool {
        self[..] == other.as_slice()[..]
    }
}

impl<T: PartialEq<U>, U, A: RawAlloc, const N: usize> PartialEq<[U; N]> for Array<T, A> {
    fn eq(&self, other: &[U; N]) -> bool {
        self.as_slice() == &other[..]
    }
}

impl<T: PartialEq<U>, U, A: RawAlloc> PartialEq<[U]> for Array<T, A> {
    fn eq(&self, other: &[U]) -> bool {
        self.as_slice() == other
    }
}

impl<T: PartialEq<U>, U, A: RawAlloc> PartialEq<&[U]> for Array<T, A> {
    fn eq(&self, other: &&[U]) -> bool {
        self.as_slice() == *other
    }
}

impl<T: Hash, A: RawAlloc> Hash for Array<T, A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl<T, A: RawAlloc> Extend<T> for Array<T, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.reserve(self.len.saturating_add(lower));
        for item in iter {
            self.push_back(item);
        }
    }
}

impl<'a, T: Copy + 'a, A: RawAlloc> Extend<&'a T> for Array<T, A> {
    fn extend<I: IntoIterator<Item = &'a T>>(&mut self, iter: I) {
        self.extend(iter.into_iter().copied());
    }
}

impl<T> FromIterator<T> for Array<T, Heap> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut array = Self::new();
        array.extend(iter);
        array
    }
}

impl<T, const N: usize> From<[T; N]> for Array<T, Heap> {
    fn from(items: [T; N]) -> Self {
        items.into_iter().collect()
    }
}

impl<T: Clone> From<&[T]> for Array<T, Heap> {
    fn from(items: &[T]) -> Self {
        Self::from_slice(items)
    }
}

/* ---------------------------------------------------------------------- */
/*                               iteration                                */
/* ---------------------------------------------------------------------- */

impl<'a, T, A: RawAlloc> IntoIterator for &'a Array<T, A> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> slice::Iter<'a, T> {
        self.as_slice().iter()
    }
}

impl<'a, T, A: RawAlloc> IntoIterator for &'a mut Array<T, A> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> slice::IterMut<'a, T> {
        self.as_mut_slice().iter_mut()
    }
}

impl<T, A: RawAlloc> IntoIterator for Array<T, A> {
    type Item = T;
    type IntoIter = IntoIter<T, A>;

    fn into_iter(self) -> IntoIter<T, A> {
        let me = ManuallyDrop::new(self);
        // SAFETY: `me` is never dropped, so the buffer has exactly one owner
        // after the read.
        let buf = unsafe { ptr::read(&me.buf) };
        IntoIter {
            buf,
            start: 0,
            end: me.len,
        }
    }
}

/// Owning iterator. Elements not yielded are dropped with it.
pub struct IntoIter<T, A: RawAlloc = Heap> {
    buf: RawBuf<T, A>,
    start: usize,
    end: usize,
}

impl<T, A: RawAlloc> IntoIter<T, A> {
    /// Elements not yet yielded.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: [start, end) is exactly the live range.
        unsafe { slice::from_raw_parts(self.buf.slot(self.start), self.end - self.start) }
    }
}

impl<T, A: RawAlloc> Iterator for IntoIter<T, A> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.start == self.end {
            return None;
        }
        let slot = self.buf.slot(self.start);
        self.start += 1;
        // SAFETY: slot was live and is now outside [start, end).
        Some(unsafe { slot.read() })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.end - self.start;
        (n, Some(n))
    }
}

impl<T, A: RawAlloc> DoubleEndedIterator for IntoIter<T, A> {
    fn next_back(&mut self) -> Option<T> {
        if self.start == self.end {
            return None;
        }
        self.end -= 1;
        // SAFETY: slot end was live and is now outside [start, end).
        Some(unsafe { self.buf.slot(self.end).read() })
    }
}

impl<T, A: RawAlloc> ExactSizeIterator for IntoIter<T, A> {}

impl<T, A: RawAlloc> FusedIterator for IntoIter<T, A> {}

impl<T: fmt::Debug, A: RawAlloc> fmt::Debug for IntoIter<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IntoIter").field(&self.as_slice()).finish()
    }
}

impl<T, A: RawAlloc> Drop for IntoIter<T, A> {
    fn drop(&mut self) {
        // SAFETY: [start, end) is live and owned by the iterator.
        unsafe { drop_range(self.buf.slot(self.start), self.end - self.start) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{Exhausted, Tracking};
    use core::cell::Cell;
    use std::rc::Rc;
    use std::string::{String, ToString};

    /* counts drops into a shared cell */
    #[derive(Clone)]
    struct DropCounter(Rc<Cell<usize>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_erase_then_unstable_erase() {
        let mut a = Array::from([1, 2, 3, 4, 5]);
        assert_eq!(a.erase(2), 2);
        assert_eq!(a, [1, 2, 4, 5]);
        a.unstable_erase(0);
        assert_eq!(a, [5, 2, 4]);
    }

    #[test]
    fn test_growth_sequence() {
        let mut a = Array::new();
        assert_eq!(a.capacity(), 0);
        let mut caps = std::vec::Vec::new();
        for i in 0..17 {
            a.push_back(i);
            if caps.last() != Some(&a.capacity()) {
                caps.push(a.capacity());
            }
        }
        assert_eq!(caps, [4, 8, 16, 32]);
    }

    #[test]
    fn test_reserve_rounds_to_power_of_two() {
        let mut a: Array<u8> = Array::new();
        a.reserve(5);
        assert_eq!(a.capacity(), 8);
        a.reserve(3);
        assert_eq!(a.capacity(), 8);
        a.reserve(8);
        assert_eq!(a.capacity(), 8);
        a.reserve(9);
        assert_eq!(a.capacity(), 16);
        assert_eq!(Array::<u8>::with_capacity(100).capacity(), 128);
    }

    #[test]
    fn test_insert_positions() {
        let mut a = Array::from([1, 3]);
        a.insert(1, 2);
        a.insert(0, 0);
        a.insert(4, 4);
        assert_eq!(a, [0, 1, 2, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "index 3 out of bounds (len 2)")]
    fn test_insert_past_end_traps() {
        let mut a = Array::from([1, 2]);
        a.insert(3, 9);
    }

    #[test]
    fn test_try_insert_reports() {
        let mut a = Array::from([1, 2]);
        assert_eq!(
            a.try_insert(5, 0),
            Err(CrtError::IndexOutOfBounds { index: 5, len: 2 })
        );
        assert_eq!(a, [1, 2]);
    }

    #[test]
    fn test_insert_slice_and_array() {
        let mut a = Array::from_copy_slice(&[1, 5]);
        a.insert_copy_slice(1, &[2, 3]);
        let b = Array::from([4]);
        a.insert_array(3, &b);
        assert_eq!(a, [1, 2, 3, 4, 5]);

        let mut s: Array<String> = Array::new();
        s.insert_slice(0, &["b".to_string(), "c".to_string()]);
        s.insert_slice(0, &["a".to_string()]);
        assert_eq!(s.as_slice(), ["a", "b", "c"]);
    }

    #[test]
    fn test_insert_slice_reserves_power_of_two() {
        let mut a = Array::from([0u32; 4]);
        assert_eq!(a.capacity(), 4);
        a.insert_copy_slice(2, &[9; 3]);
        assert_eq!(a.capacity(), 8);
        assert_eq!(a, [0, 0, 9, 9, 9, 0, 0]);
    }

    #[test]
    fn test_erase_range() {
        let mut a: Array<i32> = (0..10).collect();
        assert_eq!(a.erase_range(2..5), 2);
        assert_eq!(a, [0, 1, 5, 6, 7, 8, 9]);
        a.erase_range(..=1);
        assert_eq!(a, [5, 6, 7, 8, 9]);
        a.erase_range(3..);
        assert_eq!(a, [5, 6, 7]);
        a.erase_range(1..1);
        assert_eq!(a.len(), 3);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_erase_range_past_end_traps() {
        let mut a = Array::from([1, 2, 3]);
        a.erase_range(1..4);
    }

    #[test]
    fn test_erase_values() {
        let mut a = Array::from([1, 2, 3, 2]);
        assert!(a.erase_value(&2));
        assert_eq!(a, [1, 3, 2]);
        assert!(a.unstable_erase_value(&1));
        assert_eq!(a, [2, 3]);
        assert!(!a.erase_value(&7));
        assert!(!a.unstable_erase_value(&7));
    }

    #[test]
    fn test_unstable_erase_last() {
        let mut a = Array::from([1, 2, 3]);
        assert_eq!(a.unstable_erase(2), 2);
        assert_eq!(a, [1, 2]);
    }

    #[test]
    #[should_panic(expected = "index 3 out of bounds (len 3)")]
    fn test_erase_out_of_bounds_traps() {
        let mut a = Array::from([1, 2, 3]);
        a.erase(3);
    }

    #[test]
    #[should_panic]
    fn test_index_out_of_bounds_panics() {
        let a = Array::from([1, 2, 3]);
        let _ = a[3];
    }

    #[test]
    fn test_pop_back_and_ends() {
        let mut a = Array::from([1, 2]);
        assert_eq!(a.front(), Some(&1));
        assert_eq!(a.back(), Some(&2));
        assert_eq!(a.pop_back(), Some(2));
        assert_eq!(a.pop_back(), Some(1));
        assert_eq!(a.pop_back(), None);
        assert_eq!(a.back(), None);
    }

    #[test]
    fn test_emplace_back_returns_new_element() {
        let mut a: Array<String> = Array::new();
        let s = a.emplace_back(|| "x".to_string());
        s.push('y');
        assert_eq!(a[0], "xy");
    }

    #[test]
    fn test_clone_is_deep_and_keeps_capacity() {
        let mut a: Array<String> = Array::with_capacity(16);
        a.push_back("one".to_string());
        let mut b = a.clone();
        assert_eq!(b.capacity(), 16);
        b[0].push('!');
        assert_eq!(a[0], "one");
        assert_eq!(b[0], "one!");
    }

    #[test]
    fn test_every_element_dropped_once() {
        let drops = Rc::new(Cell::new(0));
        {
            let mut a = Array::new();
            for _ in 0..10 {
                a.push_back(DropCounter(drops.clone()));
            }
            a.erase(0);
            assert_eq!(drops.get(), 1);
            a.unstable_erase(0);
            assert_eq!(drops.get(), 2);
            a.erase_range(0..3);
            assert_eq!(drops.get(), 5);
            drop(a.pop_back());
            assert_eq!(drops.get(), 6);
        }
        assert_eq!(drops.get(), 10);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let drops = Rc::new(Cell::new(0));
        let mut a = Array::from_elem(5, DropCounter(drops.clone()));
        let cap = a.capacity();
        a.clear();
        assert_eq!(drops.get(), 5);
        assert!(a.is_empty());
        assert_eq!(a.capacity(), cap);
    }

    #[test]
    fn test_into_iter_drops_remainder() {
        let drops = Rc::new(Cell::new(0));
        let a = Array::from_elem(4, DropCounter(drops.clone()));
        let mut it = a.into_iter();
        drop(it.next());
        drop(it.next_back());
        assert_eq!(drops.get(), 2);
        assert_eq!(it.len(), 2);
        drop(it);
        assert_eq!(drops.get(), 4);
    }

    #[test]
    fn test_into_iter_order() {
        let a = Array::from([1, 2, 3]);
        let forward: std::vec::Vec<_> = a.clone().into_iter().collect();
        let backward: std::vec::Vec<_> = a.into_iter().rev().collect();
        assert_eq!(forward, [1, 2, 3]);
        assert_eq!(backward, [3, 2, 1]);
    }

    #[test]
    fn test_no_leaks_with_tracking() {
        let tracking = Tracking::new();
        {
            let mut a = Array::new_in(&tracking);
            for i in 0..1000 {
                a.push_back(i.to_string());
            }
            a.erase_range(100..900);
            let _it = a.into_iter().skip(3);
        }
        assert_eq!(tracking.live_blocks(), 0);
        assert!(tracking.reallocations() > 0);
    }

    #[test]
    fn test_zero_sized_elements() {
        let tracking = Tracking::new();
        let mut a = Array::new_in(&tracking);
        for _ in 0..100 {
            a.push_back(());
        }
        assert_eq!(a.len(), 100);
        assert_eq!(a.capacity(), 128);
        a.erase(50);
        assert_eq!(a.len(), 99);
        assert_eq!(tracking.allocations(), 0);
    }

    #[test]
    fn test_over_aligned_elements() {
        #[derive(Clone, Copy, PartialEq, Debug)]
        #[repr(align(64))]
        struct Line(u8);

        let tracking = Tracking::new();
        let mut a = Array::new_in(&tracking);
        for i in 0..40 {
            a.push_back(Line(i));
        }
        assert_eq!(a.as_ptr() as usize % 64, 0);
        assert_eq!(a[39], Line(39));
        drop(a);
        assert_eq!(tracking.live_blocks(), 0);
    }

    #[test]
    fn test_try_reserve_exhausted() {
        let mut a: Array<u64, _> = Array::new_in(Exhausted);
        assert!(matches!(
            a.try_reserve(4),
            Err(CrtError::AllocFailed { size: 32, align: 8 })
        ));
        assert_eq!(a.capacity(), 0);
        assert_eq!(
            a.try_reserve(usize::MAX),
            Err(CrtError::CapacityOverflow)
        );
    }

    #[test]
    #[should_panic(expected = "fatal")]
    fn test_push_exhausted_is_fatal() {
        let mut a: Array<u64, _> = Array::new_in(Exhausted);
        a.push_back(1);
    }

    #[test]
    fn test_hash_follows_contents() {
        use crate::hash::BuildFnv;
        use core::hash::BuildHasher;
        let a = Array::from([1u32, 2, 3]);
        let b: Array<u32> = [1u32, 2, 3].iter().copied().collect();
        assert_eq!(BuildFnv.hash_one(&a), BuildFnv.hash_one(&b));
        assert_eq!(BuildFnv.hash_one(&a), BuildFnv.hash_one(&[1u32, 2, 3][..]));
    }

    #[test]
    fn test_contains_and_position() {
        let a = Array::from(["x", "y"]);
        assert!(a.contains(&"y"));
        assert_eq!(a.position(&"y"), Some(1));
        assert_eq!(a.position(&"z"), None);
    }

    #[test]
    fn test_debug_format() {
        let a = Array::from([1, 2]);
        assert_eq!(std::format!("{:?}", a), "[1, 2]");
    }
}
