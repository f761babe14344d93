#![deny(unsafe_code)]

//! Shared test utilities for the runebot workspace.
//!
//! Provides reusable fixtures, config builders, and tracing helpers so that
//! individual crate tests stay concise and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! runebot-test-utils = { workspace = true }
//! ```

pub mod bot;
pub mod config;
pub mod inventory;
pub mod tracing_setup;
