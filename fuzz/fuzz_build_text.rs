//! Fuzz target for free-text build parsing.
//!
//! Run with: cargo +nightly fuzz run fuzz_build_text
//!
//! A parsed build must describe itself and survive a JSON round trip.

#![no_main]

use libfuzzer_sys::fuzz_target;
use runebot_core::Build;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(build) = Build::parse_text(text) else {
        return;
    };

    assert!(!build.name().is_empty());
    let _ = build.describe();

    let json = serde_json::to_string(&build).expect("build serializes");
    let restored: Build = serde_json::from_str(&json).expect("build deserializes");
    assert_eq!(restored, build);
});
