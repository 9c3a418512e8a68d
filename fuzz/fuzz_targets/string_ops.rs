/*
 * fuzz_targets/string_ops.rs
 *
 * fuzz target for the small-buffer string. mixes appends, inserts,
 * erases and resizes so strings cross the 15-unit inline limit in both
 * directions; content must match a Vec<u8> model and the terminator must
 * always sit at len.
 */

#![no_main]

use crtlib::{SmallString, Tracking};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let tracking = Tracking::new();
    {
        let mut ours = crtlib::BasicString::<u8, _>::new_in(&tracking);
        let mut model: Vec<u8> = Vec::new();
        for pair in data.chunks_exact(2) {
            let (op, arg) = (pair[0], pair[1]);
            let pos = usize::from(arg) % (model.len() + 1);
            match op % 6 {
                0 => {
                    ours.push_back(arg);
                    model.push(arg);
                }
                1 => {
                    ours.insert(pos, arg);
                    model.insert(pos, arg);
                }
                2 if pos < model.len() => {
                    ours.erase(pos);
                    model.remove(pos);
                }
                3 => {
                    let n = usize::from(arg % 40);
                    ours.resize(n);
                    model.resize(n, 0);
                }
                4 => assert_eq!(ours.pop_back(), model.pop()),
                5 => {
                    let tail: Vec<u8> = model[pos..].to_vec();
                    ours.append(&tail);
                    model.extend_from_slice(&tail);
                }
                _ => {}
            }
            assert_eq!(ours.as_slice(), model.as_slice());
            assert_eq!(ours.as_slice_with_nul()[model.len()], 0);
            let copy = SmallString::from_units(ours.as_slice());
            assert_eq!(copy.is_inline(), model.len() <= 15);
        }
    }
    assert_eq!(tracking.live_blocks(), 0);
});
