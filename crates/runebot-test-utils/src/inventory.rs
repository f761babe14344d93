//! In-memory inventory service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use runebot_core::BoxFuture;
use runebot_core::inventory::{FetchError, InventoryClient};

/// Base of the links [`FakeInventory::link`] produces.
pub const LINK_BASE: &str = "https://inventory.test/build?b=";

/// Canned inventory records keyed by record id. Unknown ids answer HTTP 404.
///
/// Clones share the same records and request counter.
#[derive(Clone, Default)]
pub struct FakeInventory {
    records: Arc<Mutex<HashMap<String, Value>>>,
    requests: Arc<AtomicUsize>,
}

impl FakeInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(self, record_id: &str, record: Value) -> Self {
        self.insert(record_id, record);
        self
    }

    pub fn insert(&self, record_id: &str, record: Value) {
        self.records
            .lock()
            .expect("fake inventory lock poisoned")
            .insert(record_id.to_string(), record);
    }

    /// Number of fetches served so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// A chat-ready link to `record_id`.
    pub fn link(record_id: &str) -> String {
        format!("{LINK_BASE}{record_id}")
    }
}

impl InventoryClient for FakeInventory {
    fn fetch<'a>(&'a self, record_id: &'a str) -> BoxFuture<'a, Result<Value, FetchError>> {
        Box::pin(async move {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.records
                .lock()
                .expect("fake inventory lock poisoned")
                .get(record_id)
                .cloned()
                .ok_or(FetchError::Status { status: 404 })
        })
    }
}

/// A well-formed inventory record with distinct attribute values.
pub fn sample_record(name: &str, rune_level: u32, weapon_upgrade: u32) -> Value {
    json!({
        "name": name,
        "weaponUpgrade": weapon_upgrade,
        "stats": {
            "rl": rune_level,
            "vig": 40, "mnd": 12, "vit": 25, "str": 16,
            "dex": 45, "int": 9, "fth": 8, "arc": 7
        }
    })
}
