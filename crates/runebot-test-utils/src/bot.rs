//! Bot test helpers.
//!
//! [`TestBot`] wires a [`Bot`] to stores in a temporary directory and a
//! [`FakeInventory`], and lets a test speak in chat as any role.

use std::path::PathBuf;

use runebot_config::AppConfig;
use runebot_core::counter::CounterStore;
use runebot_core::{Bot, BuildStore, ChatRole, Envelope, LevelTables};
use tempfile::TempDir;

use crate::config::TestConfigBuilder;
use crate::inventory::FakeInventory;

/// Channel every [`TestBot::say`] message is sent to.
pub const TEST_CHANNEL: &str = "#teststream";

/// A test-scoped bot with persistent stores in an owned temp directory.
///
/// The temp directory is deleted automatically when this value is dropped,
/// guaranteeing cleanup even on panic.
pub struct TestBot {
    pub bot: Bot,
    pub inventory: FakeInventory,
    pub builds_path: PathBuf,
    pub counters_path: PathBuf,
    config: AppConfig,
    _temp_dir: TempDir,
}

impl TestBot {
    /// A bot with default config and an empty inventory.
    pub async fn new() -> Self {
        Self::with(TestConfigBuilder::new(), FakeInventory::new()).await
    }

    /// A bot built from `builder`, with storage paths pointed at a fresh
    /// temp directory.
    pub async fn with(builder: TestConfigBuilder, inventory: FakeInventory) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let builds_path = temp_dir.path().join("builds.json");
        let counters_path = temp_dir.path().join("disconnects.json");

        let config = builder
            .builds_path(&builds_path.to_string_lossy())
            .counters_path(&counters_path.to_string_lossy())
            .build();
        let bot = open_bot(&config, &inventory).await;

        Self {
            bot,
            inventory,
            builds_path,
            counters_path,
            config,
            _temp_dir: temp_dir,
        }
    }

    /// Rebuild the bot from what is on disk, as a restart would.
    pub async fn restart(&mut self) {
        self.bot = open_bot(&self.config, &self.inventory).await;
    }

    /// Send `body` to [`TEST_CHANNEL`] as `sender` with `role`.
    pub async fn say_as(&mut self, sender: &str, role: ChatRole, body: &str) -> Option<String> {
        let message = Envelope::new(TEST_CHANNEL, sender, body).with_role(role);
        self.bot.handle(&message).await
    }

    /// Send `body` as the channel's broadcaster.
    pub async fn say(&mut self, body: &str) -> Option<String> {
        self.say_as("teststream", ChatRole::Broadcaster, body).await
    }

    /// Send `body` as a regular viewer.
    pub async fn viewer_says(&mut self, body: &str) -> Option<String> {
        self.say_as("viewer", ChatRole::Viewer, body).await
    }
}

async fn open_bot(config: &AppConfig, inventory: &FakeInventory) -> Bot {
    let builds = BuildStore::open(&config.storage.builds_path)
        .await
        .expect("failed to open build store");
    let counters_path = config
        .storage
        .counters_path
        .as_deref()
        .expect("test config sets counters_path");
    let counters = CounterStore::open(counters_path)
        .await
        .expect("failed to open counter store");
    let levels = LevelTables::bundled().expect("bundled level data is valid");

    Bot::new(config.clone(), levels, Box::new(inventory.clone())).with_stores(builds, counters)
}
