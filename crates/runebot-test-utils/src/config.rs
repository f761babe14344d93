//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use runebot_config::AppConfig;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .prefix("?")
///     .inventory_user("somestreamer", "abc123")
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.config.bot.prefix = prefix.to_string();
        self
    }

    pub fn channel(mut self, channel: &str) -> Self {
        self.config.bot.channels.push(channel.to_string());
        self
    }

    pub fn builds_path(mut self, path: &str) -> Self {
        self.config.storage.builds_path = path.to_string();
        self
    }

    pub fn counters_path(mut self, path: &str) -> Self {
        self.config.storage.counters_path = Some(path.to_string());
        self
    }

    pub fn browse_url(mut self, url: &str) -> Self {
        self.config.inventory.browse_url = url.to_string();
        self
    }

    /// Map a channel to its inventory user id (for `!builds`).
    pub fn inventory_user(mut self, channel: &str, user_id: &str) -> Self {
        self.config
            .inventory
            .user_ids
            .insert(channel.to_lowercase(), user_id.to_string());
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
