/*
 * config.rs
 *
 * Compile-time tunables. Everything the containers and the heap agree on
 * lives here so the numbers are written down once.
 *
 * Changing MAX_INLINE_LEN or the map constants changes observable capacity
 * sequences. Tests pin them.
 */

/// Longest string (in code units, terminator excluded) kept inline.
pub const MAX_INLINE_LEN: usize = 15;

/// Inline buffer size: `MAX_INLINE_LEN` units plus the NUL terminator.
pub const INLINE_CAPACITY: usize = MAX_INLINE_LEN + 1;

/// First capacity of an array that grows from empty.
pub const MIN_ARRAY_CAPACITY: usize = 4;

/// Growth factor for arrays and strings.
pub const GROWTH_FACTOR: usize = 2;

/// First capacity of a map that grows from empty. Prime.
pub const MAP_INITIAL_CAPACITY: usize = 13;

/// Map load factor ceiling as a fraction. A table whose size / capacity
/// has reached `MAP_MAX_LOAD_NUM / MAP_MAX_LOAD_DEN` grows before it
/// takes another key.
pub const MAP_MAX_LOAD_NUM: usize = 3;
pub const MAP_MAX_LOAD_DEN: usize = 5;

/// Largest alignment the raw allocator accepts.
pub const MAX_ALIGN: usize = 4096;

/// Sentinel stored in the header of over-aligned blocks.
pub const ALIGNED_TAG: u32 = 0xDDDD_DDDD;

/// Written over the sentinel when an over-aligned block is released, so a
/// second release of the same pointer trips the tag check.
pub const RELEASED_TAG: u32 = 0xCCCC_CCCC;

/* keep the invariants the rest of the crate leans on honest */
const _: () = assert!(INLINE_CAPACITY.is_power_of_two());
const _: () = assert!(MIN_ARRAY_CAPACITY.is_power_of_two());
const _: () = assert!(MAX_ALIGN.is_power_of_two());
const _: () = assert!(MAP_MAX_LOAD_NUM < MAP_MAX_LOAD_DEN);
