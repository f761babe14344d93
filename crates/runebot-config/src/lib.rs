#![deny(unsafe_code)]

//! Configuration loading, validation, and command policy for runebot.
//!
//! Loads the TOML configuration file and validates it. [`AppConfig`] is the
//! central configuration structure; the [`policy`] module decides which chat
//! roles may run which commands.

/// Role-based access control for chat commands.
pub mod policy;

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Environment variable that replaces `inventory.auth_token` when set.
pub const INVENTORY_TOKEN_ENV: &str = "RUNEBOT_INVENTORY_TOKEN";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat-facing bot settings.
    #[serde(default)]
    pub bot: BotConfig,

    /// Where builds and counters are persisted.
    #[serde(default)]
    pub storage: StorageConfig,

    /// External inventory service.
    #[serde(default)]
    pub inventory: InventoryConfig,

    /// Twitch adapter settings.
    #[serde(default)]
    pub twitch: TwitchConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Command authorization rules.
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Chat-facing bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Login name of the bot account.
    #[serde(default = "default_nick")]
    pub nick: String,

    /// Command prefix, e.g. `!` for `!build`.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Channels to join (without the leading `#`).
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            nick: default_nick(),
            prefix: default_prefix(),
            channels: Vec::new(),
        }
    }
}

fn default_nick() -> String {
    "runebot".to_string()
}

fn default_prefix() -> String {
    "!".to_string()
}

/// Persistence locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON document holding every channel's build registry.
    #[serde(default = "default_builds_path")]
    pub builds_path: String,

    /// JSON document for disconnect counters. Counters stay in memory when
    /// this is not set.
    #[serde(default)]
    pub counters_path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            builds_path: default_builds_path(),
            counters_path: None,
        }
    }
}

fn default_builds_path() -> String {
    "builds.json".to_string()
}

/// External inventory service configuration.
///
/// ## TOML Example
///
/// ```toml
/// [inventory]
/// api_url = "https://er-inventory.nyasu.business/api/builds"
/// browse_url = "https://er-inventory.nyasu.business/browse"
///
/// [inventory.user_ids]
/// somestreamer = "abc123"
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Base URL; record ids are appended as a path segment.
    #[serde(default)]
    pub api_url: String,

    /// Value for the `Authorization` header.
    #[serde(default)]
    pub auth_token: String,

    /// Base URL of the public build browser used by `!builds`.
    #[serde(default = "default_browse_url")]
    pub browse_url: String,

    /// Per-request timeout.
    #[serde(default = "default_inventory_timeout_secs")]
    pub timeout_secs: u64,

    /// Channel name → inventory user id, for `!builds` links.
    #[serde(default)]
    pub user_ids: HashMap<String, String>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            auth_token: String::new(),
            browse_url: default_browse_url(),
            timeout_secs: default_inventory_timeout_secs(),
            user_ids: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for InventoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryConfig")
            .field("api_url", &self.api_url)
            .field("auth_token", &"[REDACTED]")
            .field("browse_url", &self.browse_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("user_ids", &self.user_ids)
            .finish()
    }
}

fn default_browse_url() -> String {
    "https://er-inventory.nyasu.business/browse".to_string()
}

fn default_inventory_timeout_secs() -> u64 {
    10
}

/// Twitch adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitchConfig {
    /// Messages a single chatter may send before being throttled.
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: u32,

    /// Seconds to regain one message of allowance.
    #[serde(default = "default_rate_limit_refill_secs")]
    pub rate_limit_refill_secs: u64,
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            rate_limit_max: default_rate_limit_max(),
            rate_limit_refill_secs: default_rate_limit_refill_secs(),
        }
    }
}

fn default_rate_limit_max() -> u32 {
    20
}

fn default_rate_limit_refill_secs() -> u64 {
    3
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Command authorization rules as written in TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Effect when no rule matches ("deny" or "allow").
    #[serde(default = "default_policy_default")]
    pub default_effect: String,

    /// Rules; replaces the stock moderator/viewer rules when given.
    #[serde(default = "default_policy_rules")]
    pub rules: Vec<PolicyRuleConfig>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_effect: default_policy_default(),
            rules: default_policy_rules(),
        }
    }
}

/// A single policy rule as expressed in TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRuleConfig {
    /// Chat role ("broadcaster", "moderator", "viewer", "*").
    pub role: String,
    /// Action ("read", "write", "*").
    pub action: String,
    /// Resource ("builds", "counters", "levels", "chat", "*").
    pub resource: String,
    /// Effect ("allow" or "deny").
    pub effect: String,
    /// Priority (higher = evaluated first).
    #[serde(default)]
    pub priority: u32,
}

fn default_policy_default() -> String {
    "deny".to_string()
}

fn default_policy_rules() -> Vec<PolicyRuleConfig> {
    policy::default_rules()
        .into_iter()
        .map(|rule| PolicyRuleConfig {
            effect: match rule.effect {
                policy::Effect::Allow => "allow".to_string(),
                policy::Effect::Deny => "deny".to_string(),
            },
            role: rule.role,
            action: rule.action,
            resource: rule.resource,
            priority: rule.priority,
        })
        .collect()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::parse(&content)?;
        tracing::debug!(
            path = %path.display(),
            channels = config.bot.channels.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(s)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Replace secrets with values from the environment, if present.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Like [`apply_env_overrides`](Self::apply_env_overrides) with an
    /// explicit lookup, so callers (and tests) need not touch the process
    /// environment.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(INVENTORY_TOKEN_ENV).filter(|t| !t.is_empty()) {
            self.inventory.auth_token = token;
        }
    }

    /// Channel names and `user_ids` keys are matched case-insensitively.
    fn normalize(&mut self) {
        for channel in &mut self.bot.channels {
            *channel = channel.trim().trim_start_matches('#').to_lowercase();
        }
        self.inventory.user_ids = std::mem::take(&mut self.inventory.user_ids)
            .into_iter()
            .map(|(channel, uid)| (channel.trim_start_matches('#').to_lowercase(), uid))
            .collect();
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.prefix.is_empty() {
            return Err(ConfigError::Validation(
                "bot.prefix must not be empty".to_string(),
            ));
        }
        if self.bot.prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "bot.prefix must not contain whitespace, got {:?}",
                self.bot.prefix
            )));
        }
        if let Some(i) = self.bot.channels.iter().position(|c| c.is_empty()) {
            return Err(ConfigError::Validation(format!(
                "bot.channels[{i}] must not be empty"
            )));
        }
        if self.storage.builds_path.is_empty() {
            return Err(ConfigError::Validation(
                "storage.builds_path must not be empty".to_string(),
            ));
        }

        for (field, url) in [
            ("inventory.api_url", &self.inventory.api_url),
            ("inventory.browse_url", &self.inventory.browse_url),
        ] {
            if !url.is_empty() && !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Validation(format!(
                    "{field} must be an http(s) URL, got {url:?}"
                )));
            }
        }
        if self.inventory.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "inventory.timeout_secs must be non-zero".to_string(),
            ));
        }

        if self.twitch.rate_limit_max == 0 {
            return Err(ConfigError::Validation(
                "twitch.rate_limit_max must be at least 1".to_string(),
            ));
        }
        if self.twitch.rate_limit_refill_secs == 0 {
            return Err(ConfigError::Validation(
                "twitch.rate_limit_refill_secs must be non-zero".to_string(),
            ));
        }

        let valid_effects = ["allow", "deny"];
        if !valid_effects.contains(&self.policy.default_effect.as_str()) {
            return Err(ConfigError::Validation(format!(
                "policy.default_effect must be one of {:?}, got {:?}",
                valid_effects, self.policy.default_effect
            )));
        }
        for (i, rule) in self.policy.rules.iter().enumerate() {
            if !valid_effects.contains(&rule.effect.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "policy.rules[{i}].effect must be \"allow\" or \"deny\", got {:?}",
                    rule.effect
                )));
            }
            if rule.role.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "policy.rules[{i}].role must not be empty"
                )));
            }
        }

        Ok(())
    }

    /// Build a [`PolicyEngine`](policy::PolicyEngine) from the loaded policy config.
    pub fn build_policy_engine(&self) -> policy::PolicyEngine {
        let rules: Vec<policy::PolicyRule> = self
            .policy
            .rules
            .iter()
            .map(|r| {
                let rule = if r.effect == "allow" {
                    policy::PolicyRule::allow(&r.role, &r.action, &r.resource)
                } else {
                    policy::PolicyRule::deny(&r.role, &r.action, &r.resource)
                };
                rule.with_priority(r.priority)
            })
            .collect();

        let mut engine = policy::build_policy(rules);

        // Catch-all at the lowest priority
        if self.policy.default_effect == "allow" {
            engine.add_rule(policy::PolicyRule::allow("*", "*", "*").with_priority(0));
        }

        engine
    }

    /// Inventory user id for a channel, for `!builds` links.
    pub fn inventory_user_id(&self, channel: &str) -> Option<&str> {
        self.inventory
            .user_ids
            .get(&channel.trim_start_matches('#').to_lowercase())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.bot.prefix, "!");
        assert_eq!(config.bot.nick, "runebot");
        assert_eq!(config.storage.builds_path, "builds.json");
        assert!(config.storage.counters_path.is_none());
        assert_eq!(config.inventory.timeout_secs, 10);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.policy.rules.len(), 3);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.bot.prefix, "!");
        assert!(config.bot.channels.is_empty());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r##"
            [bot]
            nick = "RuneBot"
            prefix = "?"
            channels = ["#SomeStreamer", "other"]

            [storage]
            builds_path = "/var/lib/runebot/builds.json"
            counters_path = "/var/lib/runebot/disconnects.json"

            [inventory]
            api_url = "https://inventory.example/api/builds"
            auth_token = "secret"
            timeout_secs = 5

            [inventory.user_ids]
            SomeStreamer = "abc123"

            [twitch]
            rate_limit_max = 5
            rate_limit_refill_secs = 10

            [logging]
            level = "debug"
        "##;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.bot.prefix, "?");
        assert_eq!(config.bot.channels, vec!["somestreamer", "other"]);
        assert_eq!(
            config.storage.counters_path.as_deref(),
            Some("/var/lib/runebot/disconnects.json")
        );
        assert_eq!(config.inventory.timeout_secs, 5);
        assert_eq!(config.inventory_user_id("#SOMESTREAMER"), Some("abc123"));
        assert_eq!(config.inventory_user_id("other"), None);
        assert_eq!(config.twitch.rate_limit_max, 5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_rejects_empty_prefix() {
        assert!(AppConfig::parse("[bot]\nprefix = \"\"").is_err());
    }

    #[test]
    fn test_validation_rejects_whitespace_prefix() {
        assert!(AppConfig::parse("[bot]\nprefix = \"! \"").is_err());
    }

    #[test]
    fn test_validation_rejects_empty_channel() {
        assert!(AppConfig::parse("[bot]\nchannels = [\"a\", \"#\"]").is_err());
    }

    #[test]
    fn test_validation_rejects_non_http_api_url() {
        let toml = r#"
            [inventory]
            api_url = "ftp://inventory.example"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        assert!(AppConfig::parse("[inventory]\ntimeout_secs = 0").is_err());
    }

    #[test]
    fn test_validation_rejects_zero_rate_limit() {
        assert!(AppConfig::parse("[twitch]\nrate_limit_max = 0").is_err());
        assert!(AppConfig::parse("[twitch]\nrate_limit_refill_secs = 0").is_err());
    }

    #[test]
    fn test_default_policy_only_lets_moderators_write() {
        let config = AppConfig::default();
        let engine = config.build_policy_engine();
        assert!(engine.is_allowed("moderator", "write", "builds"));
        assert!(engine.is_allowed("broadcaster", "write", "builds"));
        assert!(engine.is_allowed("viewer", "read", "builds"));
        assert!(!engine.is_allowed("viewer", "write", "builds"));
    }

    #[test]
    fn test_policy_rules_replace_defaults() {
        let toml = r#"
            [policy]
            default_effect = "deny"

            [[policy.rules]]
            role = "broadcaster"
            action = "*"
            resource = "*"
            effect = "allow"
            priority = 10
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.policy.rules.len(), 1);

        let engine = config.build_policy_engine();
        assert!(engine.is_allowed("broadcaster", "write", "builds"));
        assert!(!engine.is_allowed("moderator", "write", "builds"));
        assert!(!engine.is_allowed("viewer", "read", "builds"));
    }

    #[test]
    fn test_policy_default_allow() {
        let toml = r#"
            [policy]
            default_effect = "allow"
            rules = []
        "#;
        let config = AppConfig::parse(toml).unwrap();
        let engine = config.build_policy_engine();
        assert!(engine.is_allowed("viewer", "write", "counters"));
    }

    #[test]
    fn test_policy_validation_rejects_bad_effect() {
        let toml = r#"
            [[policy.rules]]
            role = "moderator"
            action = "*"
            resource = "*"
            effect = "maybe"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_policy_validation_rejects_bad_default_effect() {
        assert!(AppConfig::parse("[policy]\ndefault_effect = \"sometimes\"").is_err());
    }

    #[test]
    fn test_token_override_from_lookup() {
        let mut config = AppConfig::parse("[inventory]\nauth_token = \"from-file\"").unwrap();

        config.apply_overrides_from(|_| None);
        assert_eq!(config.inventory.auth_token, "from-file");

        config.apply_overrides_from(|key| {
            (key == INVENTORY_TOKEN_ENV).then(|| "from-env".to_string())
        });
        assert_eq!(config.inventory.auth_token, "from-env");
    }

    #[test]
    fn test_debug_redacts_token() {
        let mut config = AppConfig::default();
        config.inventory.auth_token = "hunter2".to_string();
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    // ── Async file-based loading ──────────────────────────────────────

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("runebot.toml");
        tokio::fs::write(&path, b"[bot]\nprefix = \"$\"\nchannels = [\"Chan\"]\n")
            .await
            .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.bot.prefix, "$");
        assert_eq!(config.bot.channels, vec!["chan"]);
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = AppConfig::load(Path::new("/nonexistent/runebot.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[tokio::test]
    async fn test_load_invalid_toml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        tokio::fs::write(&path, b"not valid toml [[[").await.unwrap();

        let result = AppConfig::load(&path).await;
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config = AppConfig::parse("[bot]\nchannels = [\"a\"]").unwrap();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let reparsed = AppConfig::parse(&rendered).unwrap();
        assert_eq!(reparsed.bot.channels, vec!["a"]);
        assert_eq!(reparsed.policy.rules.len(), 3);
    }
}
