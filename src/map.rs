/*
 * map.rs
 *
 * Open-addressing hash map. One flat array of slots, prime capacity,
 * double hashing:
 *
 *   pos(i) = (h mod m + i * (1 + h mod (m - 1))) mod m
 *
 * With m prime the stride is coprime with m, so a probe sequence visits
 * every slot exactly once before it repeats.
 *
 * Slot states: Empty ends a probe, Deleted (tombstone) is skipped,
 * Occupied holds a live (K, V) plus its cached hash. Removal leaves a
 * tombstone; only a resize gets rid of them, since only occupied slots
 * are carried into the new table. Insert walks the path once: a match is
 * overwritten, otherwise the key takes the first tombstone passed or the
 * Empty slot that ended the walk.
 *
 * Growth: before a new key goes in, a table that is full or already at
 * a load of 3/5 moves to the smallest prime >= 2 * capacity (13 from
 * empty). The last insert may therefore take the load past 3/5, but it
 * never starts out there. Overwriting an existing key never grows.
 */

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use core::mem::{self, ManuallyDrop, MaybeUninit};
use core::ops::Index;
use core::ptr;
use core::slice;

use crate::buffer::RawBuf;
use crate::config::{MAP_INITIAL_CAPACITY, MAP_MAX_LOAD_DEN, MAP_MAX_LOAD_NUM};
use crate::error::{CrtError, Result};
use crate::hash::BuildFnv;
use crate::heap::{Heap, RawAlloc};
use crate::prime::next_prime;
use crate::{trace, trap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Empty,
    Deleted,
    Occupied,
}

struct Slot<K, V> {
    state: SlotState,
    /* valid while Occupied; kept across resizes */
    hash: u64,
    entry: MaybeUninit<(K, V)>,
}

impl<K, V> Slot<K, V> {
    const EMPTY: Self = Self {
        state: SlotState::Empty,
        hash: 0,
        entry: MaybeUninit::uninit(),
    };

    #[inline]
    fn is_occupied(&self) -> bool {
        self.state == SlotState::Occupied
    }

    /// # Safety
    ///
    /// The slot must be occupied.
    #[inline]
    unsafe fn entry(&self) -> &(K, V) {
        // SAFETY: occupied slots hold an initialized entry.
        unsafe { self.entry.assume_init_ref() }
    }

    /// # Safety
    ///
    /// The slot must be occupied.
    #[inline]
    unsafe fn entry_mut(&mut self) -> &mut (K, V) {
        // SAFETY: occupied slots hold an initialized entry.
        unsafe { self.entry.assume_init_mut() }
    }

    /// Move the entry out and leave a tombstone.
    ///
    /// # Safety
    ///
    /// The slot must be occupied.
    #[inline]
    unsafe fn vacate(&mut self) -> (K, V) {
        self.state = SlotState::Deleted;
        // SAFETY: the slot was occupied and is now marked deleted, so the
        // entry will not be read or dropped again.
        unsafe { self.entry.assume_init_read() }
    }
}

/// Probe sequence of one hash over a table of `cap` slots.
struct Probe {
    pos: usize,
    step: usize,
    cap: usize,
    remaining: usize,
}

impl Probe {
    #[inline]
    fn new(hash: u64, cap: usize) -> Self {
        debug_assert!(cap > 0);
        let m = cap as u64;
        /* both results are < m, so the casts back are lossless */
        let pos = (hash % m) as usize;
        let step = if cap > 1 { (1 + hash % (m - 1)) as usize } else { 1 };
        Self {
            pos,
            step,
            cap,
            remaining: cap,
        }
    }
}

impl Iterator for Probe {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let current = self.pos;
        /* pos + step mod cap, without overflowing near usize::MAX */
        self.pos = if self.pos >= self.cap - self.step {
            self.pos - (self.cap - self.step)
        } else {
            self.pos + self.step
        };
        Some(current)
    }
}

/* where the probe for one key ended */
enum Lookup {
    Found(usize),
    /* key absent; first tombstone or empty slot on its path, if any */
    Vacant(Option<usize>),
}

/* first non-occupied slot on the probe path of `hash` */
fn vacant_in<K, V>(slots: &[Slot<K, V>], hash: u64) -> Option<usize> {
    Probe::new(hash, slots.len()).find(|&pos| !slots[pos].is_occupied())
}

/// Hash map with open addressing and double hashing.
pub struct OpenMap<K, V, S = BuildFnv, A: RawAlloc = Heap> {
    slots: RawBuf<Slot<K, V>, A>,
    len: usize,
    tombstones: usize,
    hasher: S,
}

impl<K, V> OpenMap<K, V, BuildFnv, Heap> {
    /// Empty map. Nothing is allocated until the first insertion.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::with_hasher_in(BuildFnv, Heap)
    }

    /// Map whose table starts at the smallest prime `> n` slots.
    /// `n == 0` allocates nothing.
    #[must_use]
    #[track_caller]
    pub fn with_capacity(n: usize) -> Self {
        let mut map = Self::new();
        if n > 0 {
            let cap = n
                .checked_add(1)
                .and_then(next_prime)
                .ok_or(CrtError::CapacityOverflow);
            trap::or_abort(cap.and_then(|cap| map.try_allocate_table(cap)));
        }
        map
    }
}

impl<K, V, S> OpenMap<K, V, S, Heap> {
    pub const fn with_hasher(hasher: S) -> Self {
        Self::with_hasher_in(hasher, Heap)
    }
}

impl<K, V, A: RawAlloc> OpenMap<K, V, BuildFnv, A> {
    pub const fn new_in(alloc: A) -> Self {
        Self::with_hasher_in(BuildFnv, alloc)
    }
}

impl<K, V, S, A: RawAlloc> OpenMap<K, V, S, A> {
    pub const fn with_hasher_in(hasher: S, alloc: A) -> Self {
        Self {
            slots: RawBuf::new_in(alloc),
            len: 0,
            tombstones: 0,
            hasher,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slot count. Always 0 or prime.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Deleted slots awaiting the next resize.
    #[inline]
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    /// `len / capacity`; 1.0 for an unallocated table.
    pub fn load_factor(&self) -> f64 {
        if self.capacity() == 0 {
            return 1.0;
        }
        self.len as f64 / self.capacity() as f64
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn allocator(&self) -> &A {
        self.slots.allocator()
    }

    #[inline]
    fn slots(&self) -> &[Slot<K, V>] {
        // SAFETY: every slot of an allocated table is initialized as a Slot
        // (possibly Empty); an unallocated table yields an empty slice.
        unsafe { slice::from_raw_parts(self.slots.as_ptr(), self.slots.capacity()) }
    }

    #[inline]
    fn slots_mut(&mut self) -> &mut [Slot<K, V>] {
        // SAFETY: as for slots(), with exclusive access through &mut self.
        unsafe { slice::from_raw_parts_mut(self.slots.as_ptr(), self.slots.capacity()) }
    }

    /* first table allocation of exactly `cap` slots, every slot Empty */
    fn try_allocate_table(&mut self, cap: usize) -> Result<()> {
        debug_assert_eq!(self.capacity(), 0);
        if cap == 0 {
            return Ok(());
        }
        self.slots.try_set_capacity(cap)?;
        for slot in self.slots.spare_from(0) {
            slot.write(Slot::EMPTY);
        }
        Ok(())
    }

    /// Destroy every entry. Capacity is kept, tombstones are cleared.
    pub fn clear(&mut self) {
        let len = mem::replace(&mut self.len, 0);
        self.tombstones = 0;
        if len == 0 && self.capacity() == 0 {
            return;
        }
        for slot in self.slots_mut() {
            let was = mem::replace(&mut slot.state, SlotState::Empty);
            if was == SlotState::Occupied && mem::needs_drop::<(K, V)>() {
                // SAFETY: the slot was occupied and is now Empty, so the entry
                // is dropped exactly once.
                unsafe { slot.entry.assume_init_drop() }
            }
        }
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: self.slots().iter(),
            remaining: self.len,
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let remaining = self.len;
        IterMut {
            slots: self.slots_mut().iter_mut(),
            remaining,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.iter_mut().map(|(_, v)| v)
    }
}

impl<K, V, S, A> OpenMap<K, V, S, A>
where
    K: Hash + Eq,
    S: BuildHasher,
    A: RawAlloc,
{
    #[inline]
    fn hash_of<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        self.hasher.hash_one(key)
    }

    /*
     * One pass over the probe path of `key`. Stops at a match or at the
     * first Empty slot, remembering the first tombstone passed on the way
     * so an absent key can reuse it.
     */
    fn lookup<Q>(&self, hash: u64, key: &Q) -> Lookup
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let slots = self.slots();
        if slots.is_empty() {
            return Lookup::Vacant(None);
        }
        let mut tombstone = None;
        for pos in Probe::new(hash, slots.len()) {
            let slot = &slots[pos];
            match slot.state {
                SlotState::Empty => return Lookup::Vacant(Some(tombstone.unwrap_or(pos))),
                SlotState::Deleted if tombstone.is_none() => tombstone = Some(pos),
                SlotState::Deleted => {}
                SlotState::Occupied => {
                    // SAFETY: occupied.
                    let stored = unsafe { &slot.entry().0 };
                    if slot.hash == hash && <K as Borrow<Q>>::borrow(stored) == key {
                        return Lookup::Found(pos);
                    }
                }
            }
        }
        Lookup::Vacant(tombstone)
    }

    /* slot index of `key`, if present */
    #[inline]
    fn find_index<Q>(&self, hash: u64, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        match self.lookup(hash, key) {
            Lookup::Found(pos) => Some(pos),
            Lookup::Vacant(_) => None,
        }
    }

    /* full, or already at the load ceiling before the next key */
    #[inline]
    fn needs_growth(&self) -> bool {
        let cap = self.capacity();
        cap == 0
            || self.len == cap
            || self.len.saturating_mul(MAP_MAX_LOAD_DEN) >= cap.saturating_mul(MAP_MAX_LOAD_NUM)
    }

    /*
     * Slot for an absent key whose lookup ended at `vacant`. A table at
     * its ceiling grows first, and the key is placed by probing the new
     * table instead.
     */
    fn try_make_room(&mut self, hash: u64, vacant: Option<usize>) -> Result<usize> {
        if self.needs_growth() {
            let cap = self.capacity();
            if cap == 0 {
                self.try_allocate_table(MAP_INITIAL_CAPACITY)?;
            } else {
                let doubled = cap.checked_mul(2).ok_or(CrtError::CapacityOverflow)?;
                let target = next_prime(doubled).ok_or(CrtError::CapacityOverflow)?;
                self.try_resize(target)?;
            }
            return Ok(self.vacant_or_trap(vacant_in(self.slots(), hash)));
        }
        Ok(self.vacant_or_trap(vacant))
    }

    #[inline]
    #[track_caller]
    fn vacant_or_trap(&self, vacant: Option<usize>) -> usize {
        match vacant {
            Some(pos) => pos,
            None => trap::contract_violation(format_args!(
                "map table of {} slots has no free slot",
                self.capacity()
            )),
        }
    }

    /// Rebuild the table at `new_cap` slots (a prime). Entries are moved,
    /// not cloned, and their cached hashes are reused.
    fn try_resize(&mut self, new_cap: usize) -> Result<()> {
        let block = self.slots.try_alloc_block(new_cap)?;
        // SAFETY: the block holds new_cap uninitialized slots; each is
        // written once below before the slice is formed.
        let fresh = unsafe {
            for i in 0..new_cap {
                block.add(i).write(Slot::EMPTY);
            }
            slice::from_raw_parts_mut(block.as_ptr(), new_cap)
        };

        for old in self.slots_mut() {
            if !old.is_occupied() {
                continue;
            }
            /* the new table has more free slots than the old had entries */
            let Some(pos) = vacant_in(fresh, old.hash) else {
                trap::contract_violation(format_args!(
                    "map resize to {} slots ran out of room",
                    new_cap
                ));
            };
            fresh[pos].state = SlotState::Occupied;
            fresh[pos].hash = old.hash;
            // SAFETY: old is occupied; marking it Deleted right after keeps
            // the entry from being dropped along with the old block.
            fresh[pos].entry.write(unsafe { old.vacate() });
        }

        trace!(
            "map resize {} -> {} ({} entries, {} tombstones dropped)",
            self.capacity(),
            new_cap,
            self.len,
            self.tombstones
        );
        // SAFETY: block came from try_alloc_block with new_cap; the old block
        // holds nothing live after the loop.
        unsafe { self.slots.replace_block(block, new_cap) };
        self.tombstones = 0;
        Ok(())
    }

    /* claim the free slot `pos` for a key known to be absent */
    fn occupy(&mut self, pos: usize, hash: u64, key: K, value: V) -> usize {
        if self.slots()[pos].state == SlotState::Deleted {
            self.tombstones -= 1;
        }
        let slot = &mut self.slots_mut()[pos];
        debug_assert!(!slot.is_occupied());
        slot.state = SlotState::Occupied;
        slot.hash = hash;
        slot.entry.write((key, value));
        self.len += 1;
        pos
    }

    /// Insert or overwrite. Returns the previous value for `key`.
    /// Fails only when the table cannot grow.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        let hash = self.hash_of(&key);
        let vacant = match self.lookup(hash, &key) {
            Lookup::Found(pos) => {
                // SAFETY: Found is always an occupied slot.
                let entry = unsafe { self.slots_mut()[pos].entry_mut() };
                return Ok(Some(mem::replace(&mut entry.1, value)));
            }
            Lookup::Vacant(vacant) => vacant,
        };
        let pos = self.try_make_room(hash, vacant)?;
        self.occupy(pos, hash, key, value);
        Ok(None)
    }

    /// [`OpenMap::try_insert`], fatal on exhaustion.
    #[track_caller]
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        trap::or_abort(self.try_insert(key, value))
    }

    /// Value for `key`, inserting `make()` first if absent.
    #[track_caller]
    pub fn find_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, make: F) -> &mut V {
        let hash = self.hash_of(&key);
        let pos = match self.lookup(hash, &key) {
            Lookup::Found(pos) => pos,
            Lookup::Vacant(vacant) => {
                let pos = trap::or_abort(self.try_make_room(hash, vacant));
                self.occupy(pos, hash, key, make())
            }
        };
        // SAFETY: pos is occupied either way.
        unsafe { &mut self.slots_mut()[pos].entry_mut().1 }
    }

    /// Value for `key`, inserting `V::default()` first if absent.
    #[track_caller]
    pub fn find_or_insert(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.find_or_insert_with(key, V::default)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let pos = self.find_index(self.hash_of(key), key)?;
        // SAFETY: find_index only returns occupied slots.
        let (k, v) = unsafe { self.slots()[pos].entry() };
        Some((k, v))
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let pos = self.find_index(self.hash_of(key), key)?;
        // SAFETY: find_index only returns occupied slots.
        Some(unsafe { &mut self.slots_mut()[pos].entry_mut().1 })
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_index(self.hash_of(key), key).is_some()
    }

    /// Remove `key`, leaving a tombstone. Capacity is unchanged.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let pos = self.find_index(self.hash_of(key), key)?;
        // SAFETY: find_index only returns occupied slots.
        let entry = unsafe { self.slots_mut()[pos].vacate() };
        self.len -= 1;
        self.tombstones += 1;
        Some(entry)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }
}

impl<K, V, S, A: RawAlloc> Drop for OpenMap<K, V, S, A> {
    fn drop(&mut self) {
        if !mem::needs_drop::<(K, V)>() || self.len == 0 {
            return;
        }
        for slot in self.slots_mut() {
            if slot.is_occupied() {
                // SAFETY: occupied, and the map is going away.
                unsafe { slot.entry.assume_init_drop() }
            }
        }
    }
}

impl<K, V, S, A> Clone for OpenMap<K, V, S, A>
where
    K: Clone,
    V: Clone,
    S: Clone,
    A: RawAlloc + Clone,
{
    /// Slot-for-slot copy: same capacity, same positions, same tombstones.
    fn clone(&self) -> Self {
        let mut copy = Self::with_hasher_in(self.hasher.clone(), self.allocator().clone());
        if self.capacity() == 0 {
            return copy;
        }
        trap::or_abort(copy.try_allocate_table(self.capacity()));
        for (src, dst) in self.slots().iter().zip(copy.slots_mut().iter_mut()) {
            match src.state {
                SlotState::Empty => {}
                SlotState::Deleted => dst.state = SlotState::Deleted,
                SlotState::Occupied => {
                    dst.hash = src.hash;
                    // SAFETY: src is occupied.
                    dst.entry.write(unsafe { src.entry() }.clone());
                    dst.state = SlotState::Occupied;
                }
            }
        }
        copy.len = self.len;
        copy.tombstones = self.tombstones;
        copy
    }
}

impl<K, V, S: Default> Default for OpenMap<K, V, S, Heap> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S, A: RawAlloc> fmt::Debug for OpenMap<K, V, S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S, A, B> PartialEq<OpenMap<K, V, S, B>> for OpenMap<K, V, S, A>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
    A: RawAlloc,
    B: RawAlloc,
{
    fn eq(&self, other: &OpenMap<K, V, S, B>) -> bool {
        self.len == other.len
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|ov| v == ov))
    }
}

impl<K: Hash + Eq, V: Eq, S: BuildHasher, A: RawAlloc> Eq for OpenMap<K, V, S, A> {}

impl<K, V, S, A> Extend<(K, V)> for OpenMap<K, V, S, A>
where
    K: Hash + Eq,
    S: BuildHasher,
    A: RawAlloc,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for OpenMap<K, V, S, Heap>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for OpenMap<K, V, BuildFnv, Heap>
where
    K: Hash + Eq,
{
    fn from(items: [(K, V); N]) -> Self {
        items.into_iter().collect()
    }
}

impl<K, Q, V, S, A> Index<&Q> for OpenMap<K, V, S, A>
where
    K: Hash + Eq + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    S: BuildHasher,
    A: RawAlloc,
{
    type Output = V;

    /// Traps when `key` is absent.
    #[track_caller]
    fn index(&self, key: &Q) -> &V {
        match self.get(key) {
            Some(v) => v,
            None => trap::contract_violation(format_args!("key not found in map")),
        }
    }
}

/* -------------------------------------------------------------------------- */
/*                                 iterators                                  */
/* -------------------------------------------------------------------------- */

/// Entries in slot order.
pub struct Iter<'a, K, V> {
    slots: slice::Iter<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.slots.find(|slot| slot.is_occupied())?;
        self.remaining -= 1;
        // SAFETY: occupied.
        let (k, v) = unsafe { slot.entry() };
        Some((k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            remaining: self.remaining,
        }
    }
}

/// Entries in slot order, values mutable.
pub struct IterMut<'a, K, V> {
    slots: slice::IterMut<'a, Slot<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.slots.find(|slot| slot.is_occupied())?;
        self.remaining -= 1;
        // SAFETY: occupied.
        let (k, v) = unsafe { slot.entry_mut() };
        Some((&*k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// Owning iterator. Entries not yielded are dropped with it.
pub struct IntoIter<K, V, A: RawAlloc = Heap> {
    slots: RawBuf<Slot<K, V>, A>,
    next: usize,
    remaining: usize,
}

impl<K, V, A: RawAlloc> Iterator for IntoIter<K, V, A> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        while self.remaining > 0 && self.next < self.slots.capacity() {
            let pos = self.next;
            self.next += 1;
            // SAFETY: pos < capacity and every slot of the table is an
            // initialized Slot.
            let slot = unsafe { &mut *self.slots.slot(pos) };
            if slot.is_occupied() {
                self.remaining -= 1;
                // SAFETY: occupied; vacate marks it so Drop skips it.
                return Some(unsafe { slot.vacate() });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V, A: RawAlloc> ExactSizeIterator for IntoIter<K, V, A> {}
impl<K, V, A: RawAlloc> FusedIterator for IntoIter<K, V, A> {}

impl<K, V, A: RawAlloc> Drop for IntoIter<K, V, A> {
    fn drop(&mut self) {
        for pos in self.next..self.slots.capacity() {
            if self.remaining == 0 {
                break;
            }
            // SAFETY: pos < capacity, slots are initialized.
            let slot = unsafe { &mut *self.slots.slot(pos) };
            if slot.is_occupied() {
                self.remaining -= 1;
                // SAFETY: occupied and never visited again.
                unsafe { slot.entry.assume_init_drop() }
            }
        }
    }
}

impl<K, V, S, A: RawAlloc> IntoIterator for OpenMap<K, V, S, A> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, A>;

    fn into_iter(self) -> IntoIter<K, V, A> {
        let me = ManuallyDrop::new(self);
        let remaining = me.len;
        // SAFETY: `me` is never dropped, so the table and the hasher each
        // end up with exactly one owner.
        let slots = unsafe { ptr::read(&me.slots) };
        // SAFETY: as above; the hasher is read out so it is dropped.
        drop(unsafe { ptr::read(&me.hasher) });
        IntoIter {
            slots,
            next: 0,
            remaining,
        }
    }
}

impl<'a, K, V, S, A: RawAlloc> IntoIterator for &'a OpenMap<K, V, S, A> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, S, A: RawAlloc> IntoIterator for &'a mut OpenMap<K, V, S, A> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}


/* -------------------------------------------------------------------------- */
/*                              kani proofs                                   */
/* -------------------------------------------------------------------------- */

#[cfg(kani)]
mod kani_proofs {
    use super::*;

    /*
     * The probe step never overflows and always lands inside the table.
     */
    #[kani::proof]
    #[kani::unwind(4)]
    fn verify_probe_in_bounds() {
        let hash: u64 = kani::any();
        let cap: usize = kani::any();
        kani::assume(cap > 0);
        let mut probe = Probe::new(hash, cap);
        for _ in 0..3 {
            if let Some(pos) = probe.next() {
                kani::assert(pos < cap, "probe position inside table");
            }
        }
    }
}
