//! The bot session: command dispatch over the channel stores.
//!
//! A [`Bot`] owns everything a command can touch. The daemon hands it one
//! inbound message at a time, so no state here is shared or locked.

use tracing::{debug, error, info, warn};

use runebot_config::AppConfig;
use runebot_config::policy::PolicyEngine;

use crate::build::{Build, BuildError};
use crate::commands::{
    self, COUNTER_SAVE_FAILED, Command, FETCH_FAILED, NO_BUILD, SAVE_FAILED,
};
use crate::counter::CounterStore;
use crate::daemon::DaemonError;
use crate::inventory::{FetchError, HttpInventoryClient, InventoryClient, fetch_build};
use crate::level::{LevelTables, Role};
use crate::message::Envelope;
use crate::persist::StorageError;
use crate::store::{BuildStore, StoreError};

/// One running bot: config, stores, level tables, and the inventory client.
pub struct Bot {
    config: AppConfig,
    policy: PolicyEngine,
    builds: BuildStore,
    counters: CounterStore,
    levels: LevelTables,
    inventory: Box<dyn InventoryClient>,
}

impl Bot {
    /// Create a bot with in-memory stores.
    pub fn new(
        config: AppConfig,
        levels: LevelTables,
        inventory: Box<dyn InventoryClient>,
    ) -> Self {
        let policy = config.build_policy_engine();
        Self {
            config,
            policy,
            builds: BuildStore::in_memory(),
            counters: CounterStore::in_memory(),
            levels,
            inventory,
        }
    }

    pub fn with_stores(mut self, builds: BuildStore, counters: CounterStore) -> Self {
        self.builds = builds;
        self.counters = counters;
        self
    }

    /// Open the configured stores, load the bundled level data, and connect
    /// the inventory client.
    pub async fn from_config(config: AppConfig) -> Result<Self, DaemonError> {
        let levels = LevelTables::bundled()?;
        let inventory = HttpInventoryClient::from_config(&config.inventory)?;
        let builds = BuildStore::open(&config.storage.builds_path).await?;
        let counters = match &config.storage.counters_path {
            Some(path) => CounterStore::open(path).await?,
            None => CounterStore::in_memory(),
        };

        info!(
            host_entries = levels.host().len(),
            invader_entries = levels.invader().len(),
            "Level tables loaded"
        );
        Ok(Self::new(config, levels, Box::new(inventory)).with_stores(builds, counters))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn builds(&self) -> &BuildStore {
        &self.builds
    }

    pub fn counters(&self) -> &CounterStore {
        &self.counters
    }

    pub fn levels(&self) -> &LevelTables {
        &self.levels
    }

    /// Handle one chat message, returning the reply to post, if any.
    pub async fn handle(&mut self, message: &Envelope) -> Option<String> {
        let command = Command::parse(&self.config.bot.prefix, &message.body)?;

        let (role, action, resource) = (
            message.role.as_str(),
            command.action().as_str(),
            command.resource().as_str(),
        );
        if !self.policy.is_allowed(role, action, resource) {
            debug!(
                channel = %message.channel,
                sender = %message.sender,
                role,
                command = command.name(),
                "Command denied"
            );
            return None;
        }

        debug!(
            channel = %message.channel,
            sender = %message.sender,
            command = command.name(),
            "Handling command"
        );
        let channel = message.channel.as_str();

        match command {
            Command::Hi => Some(format!("Ayo @{}!", message.sender)),
            Command::AddBuild(args) => {
                let fetched = fetch_build(self.inventory.as_ref(), args).await;
                self.add_build(channel, fetched).await
            }
            Command::AddBuildFromText(args) => {
                let parsed = Build::parse_text(args);
                self.add_build(channel, parsed).await
            }
            Command::RemoveBuild(args) => {
                let name = commands::unquote(args);
                match self.builds.remove(channel, name).await {
                    Ok(build) => {
                        info!(channel, build = %build.name(), "Build removed");
                        Some(format!("Build {} has been removed.", build.name()))
                    }
                    Err(e) => Some(store_failure(channel, e)),
                }
            }
            Command::SetBuild(args) => {
                let name = commands::unquote(args);
                match self.builds.set_current(channel, name).await {
                    Ok(()) => {
                        info!(channel, build = %name, "Current build set");
                        Some(format!("Current build has been set to {name}."))
                    }
                    Err(e) => Some(store_failure(channel, e)),
                }
            }
            Command::Build => Some(self.current(channel, Build::describe)),
            Command::RuneLevel => Some(self.current(channel, |b| format!("RL{}", b.rune_level()))),
            Command::Stats => match self.builds.current(channel) {
                Some(build) => build.describe_stats(),
                None => Some(NO_BUILD.to_string()),
            },
            Command::Builds => self.browse_link(channel),
            Command::Level(args) => self.estimate_level(args),
            Command::Disconnects => Some(disconnects(self.counters.get(channel))),
            Command::AddDisconnect => {
                let result = self.counters.increment(channel).await;
                Some(counter_reply(channel, result))
            }
            Command::SetDisconnects(args) => {
                let Some(value) = commands::parse_amount(args) else {
                    return Some(format!("Usage: {}setdc <count>", self.config.bot.prefix));
                };
                let result = self.counters.set(channel, value).await;
                Some(counter_reply(channel, result))
            }
        }
    }

    async fn add_build(
        &mut self,
        channel: &str,
        build: Result<Build, BuildError>,
    ) -> Option<String> {
        let build = match build {
            Ok(build) => build,
            Err(BuildError::Parse(reason)) => {
                debug!(channel, reason = %reason, "Rejected build text");
                return Some(format!("Invalid build: {reason}"));
            }
            Err(BuildError::Fetch(e @ FetchError::InvalidLink(_))) => {
                debug!(channel, error = %e, "Rejected build link");
                return Some(format!("Invalid build: {e}"));
            }
            Err(BuildError::Fetch(e)) => {
                warn!(channel, error = %e, "Inventory fetch failed");
                return Some(FETCH_FAILED.to_string());
            }
        };

        let name = build.name().to_string();
        match self.builds.add(channel, build).await {
            Ok(()) => {
                info!(channel, build = %name, "Build added");
                Some(format!("Build {name} has been added."))
            }
            Err(e) => Some(store_failure(channel, e)),
        }
    }

    fn current(&self, channel: &str, render: impl FnOnce(&Build) -> String) -> String {
        self.builds
            .current(channel)
            .map_or_else(|| NO_BUILD.to_string(), render)
    }

    fn browse_link(&self, channel: &str) -> Option<String> {
        let Some(user_id) = self.config.inventory_user_id(channel) else {
            warn!(channel, "No inventory user id configured for channel");
            return None;
        };
        let base = self.config.inventory.browse_url.trim_end_matches('/');
        Some(format!(
            "You can find my public builds here: {base}/{user_id}"
        ))
    }

    fn estimate_level(&self, args: &str) -> Option<String> {
        let mut tokens = args.split_whitespace();
        let runes = tokens.next().and_then(commands::parse_amount);
        let role = tokens.next().map(str::parse::<Role>).transpose();

        let (Some(runes), Ok(role), None) = (runes, role, tokens.next()) else {
            let roles: Vec<&str> = Role::ALL.iter().map(|r| r.as_str()).collect();
            return Some(format!(
                "Usage: {}level <runes> [{}]",
                self.config.bot.prefix,
                roles.join("|")
            ));
        };

        let estimate = self.levels.estimate(runes, role)?;
        Some(format!(
            "{} runes as {}: closest RL{}",
            estimate.runes, estimate.role, estimate.level
        ))
    }
}

fn store_failure(channel: &str, error: StoreError) -> String {
    match error {
        StoreError::Registry(e) => e.to_string(),
        StoreError::Storage(e) => {
            error!(channel, error = %e, "Failed to persist builds");
            SAVE_FAILED.to_string()
        }
    }
}

fn counter_reply(channel: &str, result: Result<u64, StorageError>) -> String {
    match result {
        Ok(count) => disconnects(count),
        Err(e) => {
            error!(channel, error = %e, "Failed to persist disconnect counter");
            COUNTER_SAVE_FAILED.to_string()
        }
    }
}

fn disconnects(count: u64) -> String {
    format!("Disconnects: {count}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxFuture;
    use crate::message::ChatRole;
    use serde_json::Value;

    struct Offline;

    impl InventoryClient for Offline {
        fn fetch<'a>(&'a self, _record_id: &'a str) -> BoxFuture<'a, Result<Value, FetchError>> {
            Box::pin(async { Err(FetchError::Network("offline".to_string())) })
        }
    }

    fn bot() -> Bot {
        let levels = LevelTables::parse("1 1000\n2 2000\n713 -\n").unwrap();
        Bot::new(AppConfig::default(), levels, Box::new(Offline))
    }

    async fn say(bot: &mut Bot, role: ChatRole, body: &str) -> Option<String> {
        let message = Envelope::new("#chan", "alice", body).with_role(role);
        bot.handle(&message).await
    }

    #[tokio::test]
    async fn test_hi_greets_sender() {
        let mut bot = bot();
        assert_eq!(
            say(&mut bot, ChatRole::Viewer, "!hi").await.as_deref(),
            Some("Ayo @alice!")
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_reply_is_generic() {
        let mut bot = bot();
        let reply = say(&mut bot, ChatRole::Moderator, "!addbuild https://inv.example/b?b=abc").await;
        assert_eq!(reply.as_deref(), Some(FETCH_FAILED));
    }

    #[tokio::test]
    async fn test_bad_link_is_reported() {
        let mut bot = bot();
        let reply = say(&mut bot, ChatRole::Moderator, "!addbuild nope").await.unwrap();
        assert!(reply.starts_with("Invalid build:"), "{reply}");
    }

    #[tokio::test]
    async fn test_level_usage_on_bad_input() {
        let mut bot = bot();
        for body in ["!level", "!level lots", "!level 10 wizard", "!level 10 host extra"] {
            let reply = say(&mut bot, ChatRole::Viewer, body).await.unwrap();
            assert!(reply.starts_with("Usage: !level <runes>"), "{body}: {reply}");
        }
    }

    #[tokio::test]
    async fn test_builds_without_user_id_is_silent() {
        let mut bot = bot();
        assert_eq!(say(&mut bot, ChatRole::Viewer, "!builds").await, None);
    }
}
