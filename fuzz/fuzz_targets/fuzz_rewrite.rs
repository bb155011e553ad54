//! Fuzz target for the main rule set.
//!
//! This fuzzes `apply(&MAIN_RULES, ..)` with arbitrary chunk text to find:
//! - Panics from unexpected input (byte offsets off char boundaries)
//! - Rule patterns that fail to compile at first use
//! - Scans that abort (`RewriteError::Execution`): the shipped rules run on
//!   the linear engine, so any input must either rewrite or be refused

#![no_main]

use libfuzzer_sys::fuzz_target;

use bootstrap_pollution_guard::engine::{MatchContext, apply};
use bootstrap_pollution_guard::rules::main_chunk::MAIN_RULES;

fuzz_target!(|data: &[u8]| {
    if let Ok(chunk) = std::str::from_utf8(data) {
        // Skip extremely large inputs to avoid timeouts (not a real bug).
        if chunk.len() > 64 * 1024 {
            return;
        }

        let ctx = MatchContext::new(Some("fuzz"));
        match apply(&MAIN_RULES, chunk, &ctx) {
            // the exports guard is mandatory, so something was guarded
            Ok(hardened) => assert!(hardened.contains("__proto__: null")),
            Err(err) if err.is_structural_mismatch() => {
                assert!(err.to_string().ends_with(" not found in fuzz"));
            }
            Err(err) => panic!("{err}"),
        }
    }
});
