/*
 * fuzz_targets/map_ops.rs
 *
 * fuzz target for the open-addressing map. small key space so inserts,
 * overwrites and removals collide constantly and tombstones pile up
 * between resizes. checked against HashMap after every step.
 */

#![no_main]

use std::collections::HashMap;

use crtlib::prime::is_prime;
use crtlib::{OpenMap, Tracking};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let tracking = Tracking::new();
    {
        let mut ours = OpenMap::new_in(&tracking);
        let mut model = HashMap::new();
        for pair in data.chunks_exact(2) {
            let (op, key) = (pair[0], pair[1] % 48);
            let before = (ours.len(), ours.capacity());
            match op % 4 {
                0 | 1 => {
                    assert_eq!(ours.insert(key, op), model.insert(key, op));
                    /* a new key only lands without a resize below the ceiling */
                    if ours.len() > before.0 && ours.capacity() == before.1 {
                        assert!(before.0 * 5 < before.1 * 3);
                    }
                }
                2 => assert_eq!(ours.remove(&key), model.remove(&key)),
                _ => assert_eq!(ours.get(&key), model.get(&key)),
            }
            assert_eq!(ours.len(), model.len());
            assert!(ours.capacity() == 0 || is_prime(ours.capacity() as u64));
        }
        assert_eq!(ours.iter().count(), model.len());
    }
    assert_eq!(tracking.live_blocks(), 0);
});
