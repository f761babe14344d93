#![deny(unsafe_code)]

//! runebot CLI — run the chat bot, drive it from a console, or query its data.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use runebot_config::AppConfig;
use runebot_core::commands::parse_amount;
use runebot_core::message::ChatRole;
use runebot_core::{Bot, BuildStore, Daemon, Estimate, LevelTables, Role};
use runebot_twitch::{TwitchMessage, TwitchService};

/// runebot — Twitch chat bot for build tracking and rune-level estimates.
#[derive(Parser)]
#[command(name = "runebot", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "runebot.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot daemon with the Twitch adapter.
    Start,

    /// Chat with the bot from stdin, one message per line.
    Console {
        /// Channel the messages are sent to.
        #[arg(long)]
        channel: String,

        /// Sender login.
        #[arg(long, default_value = "console")]
        user: String,

        /// Sender role: viewer, moderator, or broadcaster.
        #[arg(long, default_value = "broadcaster")]
        role: ChatRole,
    },

    /// Estimate an opponent's level from the runes they paid out.
    Level {
        /// Runes received (`_` and `,` separators allowed).
        runes: String,

        /// Role you played (host, phantom, invader, bloody-finger, ...).
        #[arg(long)]
        role: Option<Role>,
    },

    /// List stored builds.
    Builds {
        /// Only this channel.
        #[arg(long)]
        channel: Option<String>,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose, &config))),
        )
        .init();

    match cli.command {
        Commands::Start => cmd_start(config).await?,
        Commands::Console {
            channel,
            user,
            role,
        } => cmd_console(config, &channel, &user, role).await?,
        Commands::Level { runes, role } => cmd_level(&runes, role)?,
        Commands::Builds { channel } => cmd_builds(&config, channel.as_deref()).await?,
        Commands::Config { show } => cmd_config(&config, &cli.config, show)?,
    }

    Ok(())
}

/// `-v` flags win over the configured level.
fn log_filter(verbose: u8, config: &AppConfig) -> String {
    match verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

async fn cmd_start(config: AppConfig) -> Result<()> {
    info!(channels = ?config.bot.channels, "Starting runebot daemon");

    let bot = Bot::from_config(config.clone()).await?;
    let mut daemon = Daemon::new(bot);
    let (service, handle, mut outgoing) = TwitchService::new(daemon.message_sender(), &config);
    let service_task = tokio::spawn(service.run());

    // Chat transport attaches here; until then replies are only logged
    let outgoing_task = tokio::spawn(async move {
        while let Some(msg) = outgoing.recv().await {
            info!(channel = %msg.channel, body = %msg.body, "Reply ready for chat");
        }
    });

    daemon.run().await?;

    handle.shutdown().await?;
    service_task.await?;
    outgoing_task.await?;
    Ok(())
}

async fn cmd_console(mut config: AppConfig, channel: &str, user: &str, role: ChatRole) -> Result<()> {
    let channel = runebot_core::store::channel_key(channel);
    if !config.bot.channels.contains(&channel) {
        config.bot.channels.push(channel.clone());
    }
    let nick = config.bot.nick.clone();

    let bot = Bot::from_config(config.clone()).await?;
    let mut daemon = Daemon::new(bot);
    let stop = daemon.shutdown_handle();
    let (service, handle, mut outgoing) = TwitchService::new(daemon.message_sender(), &config);

    let daemon_task = tokio::spawn(async move { daemon.run().await });
    let service_task = tokio::spawn(service.run());
    let printer = tokio::spawn(async move {
        while let Some(msg) = outgoing.recv().await {
            println!("{nick}: {}", msg.body);
        }
    });

    let badge = match role {
        ChatRole::Broadcaster => "broadcaster/1",
        ChatRole::Moderator => "moderator/1",
        ChatRole::Viewer => "",
    };
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let msg = TwitchMessage::text(&format!("#{channel}"), user, &line).with_badges(badge);
        handle.deliver(msg).await?;
    }

    // Route every line, let the daemon answer them, then let the service
    // queue the last replies; its exit closes the outgoing queue
    handle.flush().await?;
    let _ = stop.send(runebot_core::daemon::ShutdownSignal);
    daemon_task.await??;
    handle.shutdown().await?;
    service_task.await?;
    printer.await?;
    Ok(())
}

fn cmd_level(runes: &str, role: Option<Role>) -> Result<()> {
    let amount = parse_amount(runes).ok_or_else(|| anyhow!("invalid rune amount {runes:?}"))?;
    let tables = LevelTables::bundled()?;
    let estimate = tables
        .estimate(amount, role)
        .ok_or_else(|| anyhow!("level table is empty"))?;
    println!("{}", describe_estimate(&estimate));
    Ok(())
}

fn describe_estimate(estimate: &Estimate) -> String {
    format!(
        "{} runes as {}: closest RL{} (payout {})",
        estimate.runes, estimate.role, estimate.level, estimate.threshold
    )
}

async fn cmd_builds(config: &AppConfig, channel: Option<&str>) -> Result<()> {
    let store = BuildStore::open(&config.storage.builds_path).await?;
    let wanted = channel.map(runebot_core::store::channel_key);

    for (name, registry) in store.channels() {
        if wanted.as_deref().is_some_and(|w| w != name) {
            continue;
        }
        println!("#{name}: {registry}");
        for build in registry.iter() {
            println!("  {}", build.describe());
        }
    }
    Ok(())
}

fn cmd_config(config: &AppConfig, config_path: &Path, show: bool) -> Result<()> {
    if show {
        let toml_str = toml::to_string_pretty(&redacted(config)).context("TOML error")?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

fn redacted(config: &AppConfig) -> AppConfig {
    let mut config = config.clone();
    if !config.inventory.auth_token.is_empty() {
        config.inventory.auth_token = "<redacted>".to_string();
    }
    config
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    let mut config = if path.exists() {
        AppConfig::load(path)
            .await
            .with_context(|| format!("failed to load {}", path.display()))?
    } else {
        AppConfig::default()
    };
    config.apply_env_overrides();
    Ok(config)
}
