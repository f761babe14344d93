//! Fuzz target for the level dataset parser and nearest-payout lookup.
//!
//! Run with: cargo +nightly fuzz run fuzz_level_table
//!
//! Any dataset that parses must produce sorted tables whose lookups return
//! one of their own thresholds.

#![no_main]

use libfuzzer_sys::fuzz_target;
use runebot_core::level::{LevelTables, Role, closest};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(tables) = LevelTables::parse(text) else {
        return;
    };

    for role in [Role::Host, Role::Invader] {
        let thresholds = tables.table(role).thresholds();
        assert!(thresholds.windows(2).all(|w| w[0] < w[1]));

        for query in [0, 1, data.len() as u64 * 97, u64::MAX] {
            if let Some(found) = closest(thresholds, query) {
                assert!(thresholds.binary_search(&found).is_ok());
            }
        }
    }
});
