/*
 * fuzz_targets/array_ops.rs
 *
 * fuzz target for the growable array. decodes the input as a stream of
 * operations and replays them against Array and a Vec model; any
 * divergence, leak or out-of-bounds write aborts.
 *
 * edge cases: insert at len, erase the last element, empty ranges,
 * growth right at a power of two
 */

#![no_main]

use crtlib::{Array, Tracking};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let tracking = Tracking::new();
    {
        let mut ours = Array::new_in(&tracking);
        let mut model: Vec<u8> = Vec::new();
        for pair in data.chunks_exact(2) {
            let (op, arg) = (pair[0], pair[1]);
            let pos = usize::from(arg) % (model.len() + 1);
            match op % 7 {
                0 | 1 => {
                    ours.push_back(arg);
                    model.push(arg);
                }
                2 => assert_eq!(ours.pop_back(), model.pop()),
                3 => {
                    ours.insert(pos, arg);
                    model.insert(pos, arg);
                }
                4 if pos < model.len() => {
                    ours.erase(pos);
                    model.remove(pos);
                }
                5 if pos < model.len() => {
                    ours.unstable_erase(pos);
                    model.swap_remove(pos);
                }
                6 => {
                    let end = pos + (model.len() - pos) / 2;
                    ours.erase_range(pos..end);
                    model.drain(pos..end);
                }
                _ => {}
            }
            assert_eq!(ours.as_slice(), model.as_slice());
            assert!(ours.capacity() == 0 || ours.capacity().is_power_of_two());
        }
    }
    assert_eq!(tracking.live_blocks(), 0);
});
