//! Core daemon process — startup, shutdown, and main event loop.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use runebot_config::AppConfig;

use crate::bot::Bot;
use crate::inventory::FetchError;
use crate::level::LevelError;
use crate::message::{Direction, Envelope};
use crate::persist::StorageError;

/// Shutdown signal sent via broadcast channel.
#[derive(Debug, Clone)]
pub struct ShutdownSignal;

/// The main runebot daemon.
///
/// Inbound envelopes published on the bus are handed to the [`Bot`] one at a
/// time; replies are published back as outbound envelopes.
pub struct Daemon {
    bot: Bot,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
    shutdown_rx: broadcast::Receiver<ShutdownSignal>,
    message_tx: broadcast::Sender<Envelope>,
    inbound_rx: broadcast::Receiver<Envelope>,
}

impl Daemon {
    /// Create a new daemon around a bot session.
    pub fn new(bot: Bot) -> Self {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (message_tx, inbound_rx) = broadcast::channel(256);

        Self {
            bot,
            shutdown_tx,
            shutdown_rx,
            message_tx,
            inbound_rx,
        }
    }

    /// Run the daemon until a shutdown signal is received.
    pub async fn run(&mut self) -> Result<(), DaemonError> {
        info!(
            nick = %self.config().bot.nick,
            channels = ?self.config().bot.channels,
            "runebot daemon starting"
        );

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            // Queued messages are answered before a shutdown is honoured
            let received = tokio::select! {
                biased;
                received = self.inbound_rx.recv() => received,
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping daemon");
                    break;
                }
                _ = &mut ctrl_c => {
                    warn!("Ctrl-C received, initiating graceful shutdown");
                    let _ = self.shutdown_tx.send(ShutdownSignal);
                    break;
                }
            };

            match received {
                Ok(envelope) if envelope.direction == Direction::Inbound => {
                    self.dispatch(&envelope).await;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Message bus lagged, inbound messages dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }

        info!("Daemon stopped");
        Ok(())
    }

    async fn dispatch(&mut self, envelope: &Envelope) {
        let Some(body) = self.bot.handle(envelope).await else {
            return;
        };
        debug!(channel = %envelope.channel, reply = %body, "Publishing reply");
        if self.message_tx.send(envelope.reply(&body)).is_err() {
            warn!(channel = %envelope.channel, "No bus subscribers for reply");
        }
    }

    /// Request a graceful shutdown of the daemon.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(ShutdownSignal);
    }

    /// A handle that can stop the daemon from another task.
    pub fn shutdown_handle(&self) -> broadcast::Sender<ShutdownSignal> {
        self.shutdown_tx.clone()
    }

    /// Get a sender for the message bus.
    pub fn message_sender(&self) -> broadcast::Sender<Envelope> {
        self.message_tx.clone()
    }

    /// Subscribe to the message bus.
    pub fn message_subscriber(&self) -> broadcast::Receiver<Envelope> {
        self.message_tx.subscribe()
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Get a reference to the daemon's configuration.
    pub fn config(&self) -> &AppConfig {
        self.bot.config()
    }
}

/// Errors from the daemon runtime.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("level data is corrupt: {0}")]
    Levels(#[from] LevelError),

    #[error("build store unavailable: {0}")]
    Storage(#[from] StorageError),

    #[error("inventory client setup failed: {0}")]
    Inventory(#[from] FetchError),
}
