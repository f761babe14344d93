#![deny(unsafe_code)]

//! runebot core runtime.
//!
//! Builds and their per-channel registries, the stores that persist them,
//! rune-level estimation, the inventory service client, and the chat command
//! layer. The [`Daemon`] drives a [`Bot`] session from the message bus that
//! chat adapters publish to.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future — the standard return type for async
/// trait methods that require dynamic dispatch (`dyn Trait`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Bot session and command dispatch.
pub mod bot;
/// Character build records.
pub mod build;
/// Chat command parsing and authorization mapping.
pub mod commands;
/// Per-channel disconnect counters.
pub mod counter;
/// Async daemon runtime and message bus.
pub mod daemon;
/// Inventory service client.
pub mod inventory;
/// Rune-level estimation tables.
pub mod level;
/// Message envelope types for the internal bus.
pub mod message;
/// Atomic JSON document persistence.
pub mod persist;
/// Per-channel build registry.
pub mod registry;
/// Channel-keyed build store.
pub mod store;

pub use bot::Bot;
pub use build::{Build, BuildError, Stats};
pub use daemon::{Daemon, DaemonError};
pub use inventory::{FetchError, HttpInventoryClient, InventoryClient};
pub use level::{Estimate, LevelTables, Role, closest};
pub use message::{ChatRole, Direction, Envelope};
pub use registry::{Registry, RegistryError};
pub use store::{BuildStore, StoreError};
