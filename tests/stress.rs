/*
 * Stress tests for the allocator and containers.
 *
 * Larger workloads than the unit tests, plus coarse timing bounds so a
 * complexity regression (quadratic growth, probe chains that never end,
 * a primality test that crawls) fails loudly. Tolerances are wide to
 * avoid flaky failures on loaded CI machines.
 *
 * Run with: cargo test --release --test stress
 */

#![allow(clippy::uninlined_format_args, clippy::cast_possible_truncation)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crtlib::heap::{self, RawAlloc};
use crtlib::prime::next_prime;
use crtlib::{Array, Heap, OpenMap, SmallString, Tracking};

/* debug builds get 10x the budget */
fn budget(release: Duration) -> Duration {
    if cfg!(debug_assertions) {
        release * 10
    } else {
        release
    }
}

/* =========================================================================
 * ARRAY
 * ========================================================================= */

#[test]
fn stress_array_million_pushes() {
    /*
     * Doubling growth makes a million pushes O(n) amortized.
     * Target: well under 1s even in debug.
     */
    let tracking = Tracking::new();
    let start = Instant::now();
    {
        let mut a = Array::new_in(&tracking);
        for i in 0..1_000_000u64 {
            a.push_back(i);
        }
        assert_eq!(a.len(), 1_000_000);
        assert_eq!(a.capacity(), 1 << 20);
        assert_eq!(a[999_999], 999_999);
    }
    let elapsed = start.elapsed();
    assert_eq!(tracking.live_blocks(), 0);
    /* one allocation at 4, then 18 doublings to 2^20 */
    assert!(tracking.reallocations() <= 20, "reallocations {}", tracking.reallocations());
    assert!(elapsed < budget(Duration::from_millis(500)), "took {:?}", elapsed);
}

#[test]
fn stress_array_front_insert_erase() {
    let mut a: Array<u32> = Array::with_capacity(4096);
    for i in 0..4096 {
        a.insert(0, i);
    }
    for i in (0..4096).rev() {
        assert_eq!(a.remove(0), i);
    }
    assert!(a.is_empty());
}

/* =========================================================================
 * MAP
 * ========================================================================= */

#[test]
fn stress_map_hundred_thousand_keys() {
    /*
     * Many resizes and a long tail of tombstones. Double hashing with
     * prime capacity keeps lookups short.
     */
    let tracking = Tracking::new();
    let start = Instant::now();
    {
        let mut m = OpenMap::new_in(&tracking);
        for i in 0..100_000u64 {
            m.insert(i.wrapping_mul(0x9e37_79b9_7f4a_7c15), i);
        }
        for i in (0..100_000u64).step_by(2) {
            assert_eq!(m.remove(&i.wrapping_mul(0x9e37_79b9_7f4a_7c15)), Some(i));
        }
        assert_eq!(m.len(), 50_000);
        for i in (1..100_000u64).step_by(2) {
            assert_eq!(m.get(&i.wrapping_mul(0x9e37_79b9_7f4a_7c15)), Some(&i));
        }
        assert!(m.load_factor() < 0.6);
    }
    let elapsed = start.elapsed();
    assert_eq!(tracking.live_blocks(), 0);
    assert!(elapsed < budget(Duration::from_secs(1)), "took {:?}", elapsed);
}

#[test]
fn stress_map_string_keys() {
    let mut m: OpenMap<SmallString, usize> = OpenMap::new();
    for i in 0..20_000usize {
        let key = SmallString::from(format!("key-{:08}", i).as_str());
        m.insert(key, i);
    }
    for i in 0..20_000usize {
        let key = format!("key-{:08}", i);
        assert_eq!(m.get(key.as_bytes()), Some(&i));
    }
}

#[test]
#[cfg(target_pointer_width = "64")]
fn stress_next_prime_large() {
    /*
     * Capacity search near the top of the range. Miller-Rabin keeps each
     * candidate to a few dozen modular multiplications.
     */
    let start = Instant::now();
    let mut n = 1usize << 40;
    for _ in 0..1000 {
        let p = next_prime(n).unwrap();
        assert!(p >= n);
        n = p + 1;
    }
    let elapsed = start.elapsed();
    assert!(elapsed < budget(Duration::from_millis(500)), "took {:?}", elapsed);
}

/* =========================================================================
 * STRING
 * ========================================================================= */

#[test]
fn stress_string_growth() {
    let tracking = Tracking::new();
    {
        let mut s = crtlib::BasicString::<u8, _>::new_in(&tracking);
        for i in 0..100_000usize {
            s.push_back(b'a' + (i % 26) as u8);
        }
        assert_eq!(s.len(), 100_000);
        assert_eq!(s.capacity(), 1 << 17);
        assert_eq!(s.as_slice_with_nul()[100_000], 0);
    }
    assert_eq!(tracking.live_blocks(), 0);
}

/* =========================================================================
 * ALLOCATOR
 * ========================================================================= */

#[test]
fn stress_heap_concurrent_first_use() {
    /*
     * Many threads race on the first allocation; all must see the same
     * handle and every block must come back intact.
     */
    let barrier = Arc::new(std::sync::Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let handle = heap::handle() as *const crtlib::HeapHandle as usize;
                for round in 0..2000usize {
                    let align = 1usize << (round % 10);
                    let p = Heap.allocate(64, align).unwrap();
                    // SAFETY: p holds 64 bytes.
                    unsafe { p.as_ptr().write_bytes(t as u8, 64) };
                    // SAFETY: as above.
                    assert_eq!(unsafe { *p.as_ptr().add(63) }, t as u8);
                    // SAFETY: p is live with this alignment.
                    unsafe { Heap.deallocate(p.as_ptr(), align) };
                }
                handle
            })
        })
        .collect();
    let seen: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(seen.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn stress_containers_across_threads() {
    let handles: Vec<_> = (0..4)
        .map(|t| {
            thread::spawn(move || {
                let mut m: OpenMap<u32, Array<u32>> = OpenMap::new();
                for i in 0..2000u32 {
                    m.find_or_insert(i % 97).push_back(i + t);
                }
                m.values().map(Array::len).sum::<usize>()
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), 2000);
    }
}
