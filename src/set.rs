/*
 * set.rs
 *
 * OpenSet is an OpenMap with unit values. Same table, same probing,
 * same growth.
 */

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};

use crate::error::Result;
use crate::hash::BuildFnv;
use crate::heap::{Heap, RawAlloc};
use crate::map::{self, OpenMap};

/// Hash set over [`OpenMap`].
pub struct OpenSet<T, S = BuildFnv, A: RawAlloc = Heap> {
    map: OpenMap<T, (), S, A>,
}

impl<T> OpenSet<T, BuildFnv, Heap> {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            map: OpenMap::new(),
        }
    }

    #[must_use]
    #[track_caller]
    pub fn with_capacity(n: usize) -> Self {
        Self {
            map: OpenMap::with_capacity(n),
        }
    }
}

impl<T, S, A: RawAlloc> OpenSet<T, S, A> {
    pub const fn with_hasher_in(hasher: S, alloc: A) -> Self {
        Self {
            map: OpenMap::with_hasher_in(hasher, alloc),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.map.capacity()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.map.keys()
    }
}

impl<T, S, A> OpenSet<T, S, A>
where
    T: Hash + Eq,
    S: BuildHasher,
    A: RawAlloc,
{
    /// Add `value`. Returns whether it was new; an existing equal value
    /// is kept.
    pub fn try_insert(&mut self, value: T) -> Result<bool> {
        if self.map.contains_key(&value) {
            return Ok(false);
        }
        self.map.try_insert(value, ())?;
        Ok(true)
    }

    #[track_caller]
    pub fn insert(&mut self, value: T) -> bool {
        if self.map.contains_key(&value) {
            return false;
        }
        self.map.insert(value, ());
        true
    }

    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(value)
    }

    pub fn get<Q>(&self, value: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get_key_value(value).map(|(k, _)| k)
    }

    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.remove(value).is_some()
    }

    pub fn take<Q>(&mut self, value: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.remove_entry(value).map(|(k, ())| k)
    }
}

impl<T: Clone, S: Clone, A: RawAlloc + Clone> Clone for OpenSet<T, S, A> {
    fn clone(&self) -> Self {
        Self {
            map: self.map.clone(),
        }
    }
}

impl<T, S: Default> Default for OpenSet<T, S, Heap> {
    fn default() -> Self {
        Self {
            map: OpenMap::default(),
        }
    }
}

impl<T: fmt::Debug, S, A: RawAlloc> fmt::Debug for OpenSet<T, S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, S, A, B> PartialEq<OpenSet<T, S, B>> for OpenSet<T, S, A>
where
    T: Hash + Eq,
    S: BuildHasher,
    A: RawAlloc,
    B: RawAlloc,
{
    fn eq(&self, other: &OpenSet<T, S, B>) -> bool {
        self.map == other.map
    }
}

impl<T: Hash + Eq, S: BuildHasher, A: RawAlloc> Eq for OpenSet<T, S, A> {}

impl<T, S, A> Extend<T> for OpenSet<T, S, A>
where
    T: Hash + Eq,
    S: BuildHasher,
    A: RawAlloc,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<T, S> FromIterator<T> for OpenSet<T, S, Heap>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::default();
        set.extend(iter);
        set
    }
}

impl<T: Hash + Eq, const N: usize> From<[T; N]> for OpenSet<T, BuildFnv, Heap> {
    fn from(items: [T; N]) -> Self {
        items.into_iter().collect()
    }
}

/// Owning iterator over an [`OpenSet`].
pub struct IntoIter<T, A: RawAlloc = Heap> {
    inner: map::IntoIter<T, (), A>,
}

impl<T, A: RawAlloc> Iterator for IntoIter<T, A> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.inner.next().map(|(k, ())| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T, A: RawAlloc> ExactSizeIterator for IntoIter<T, A> {}

impl<T, S, A: RawAlloc> IntoIterator for OpenSet<T, S, A> {
    type Item = T;
    type IntoIter = IntoIter<T, A>;

    fn into_iter(self) -> IntoIter<T, A> {
        IntoIter {
            inner: self.map.into_iter(),
        }
    }
}
