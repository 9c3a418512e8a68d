/*
 * hash.rs
 *
 * FNV-1a, the default hash of the map. Byte-at-a-time, no state beyond
 * one word, deterministic across runs. Not DoS-resistant; callers who
 * hash attacker-controlled keys should plug in their own BuildHasher.
 */

use core::hash::{BuildHasher, Hasher};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a hasher.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a {
    state: u64,
}

impl Fnv1a {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: FNV_OFFSET_BASIS,
        }
    }
}

impl Default for Fnv1a {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for Fnv1a {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        let mut hash = self.state;
        for &byte in bytes {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        self.state = hash;
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }
}

/// Builds [`Fnv1a`] hashers. Default hasher of [`crate::map::OpenMap`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildFnv;

impl BuildHasher for BuildFnv {
    type Hasher = Fnv1a;

    #[inline]
    fn build_hasher(&self) -> Fnv1a {
        Fnv1a::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::hash::Hash;

    /* raw FNV-1a, without the length prefix `Hash for [u8]` adds */
    fn fnv(bytes: &[u8]) -> u64 {
        let mut hasher = Fnv1a::new();
        hasher.write(bytes);
        hasher.finish()
    }

    #[test]
    fn test_known_vectors() {
        /* published FNV-1a 64-bit test vectors */
        assert_eq!(fnv(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv(b"a"), 0xaf63_dc4c_8601_ec8c);
        assert_eq!(fnv(b"foobar"), 0x8594_4171_f739_67e8);
    }

    #[test]
    fn test_build_hasher_is_deterministic() {
        let a = BuildFnv.hash_one("key");
        let b = BuildFnv.hash_one("key");
        assert_eq!(a, b);
        assert_ne!(a, BuildFnv.hash_one("kez"));
    }

    #[test]
    fn test_slice_and_array_hash_agree() {
        let mut h1 = BuildFnv.build_hasher();
        [1u8, 2, 3][..].hash(&mut h1);
        let mut h2 = BuildFnv.build_hasher();
        (&[1u8, 2, 3][..]).hash(&mut h2);
        assert_eq!(h1.finish(), h2.finish());
    }
}
