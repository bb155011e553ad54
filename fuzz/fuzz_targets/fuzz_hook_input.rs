//! Fuzz target for hook input parsing.
//!
//! Arbitrary bytes on stdin must produce a `HookReadError`, never a panic,
//! and the size limit must hold for every input.

#![no_main]

use libfuzzer_sys::fuzz_target;

use bootstrap_pollution_guard::hook::{HookReadError, chunk_info, read_hook_input_from};

const LIMIT: usize = 4096;

fuzz_target!(|data: &[u8]| {
    match read_hook_input_from(data, LIMIT) {
        Ok(input) => {
            assert!(data.len() <= LIMIT);
            assert!(chunk_info(&input, "main").name.is_some());
        }
        Err(HookReadError::InputTooLarge(len)) => assert!(len > LIMIT),
        Err(_) => {}
    }
});
