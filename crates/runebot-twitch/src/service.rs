//! Async Twitch service — bridges chat messages to the core daemon message bus.

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use runebot_config::AppConfig;
use runebot_core::message::{Direction, Envelope};
use runebot_core::store::channel_key;

use crate::TwitchError;
use crate::message::TwitchMessage;
use crate::rate_limit::{RateLimitConfig, RateLimiter};

/// How often idle rate-limit buckets are reclaimed.
const RATE_LIMIT_SWEEP: Duration = Duration::from_secs(60);

/// Commands that can be sent to the Twitch service.
#[derive(Debug)]
pub enum ServiceCommand {
    /// A chat message the transport received.
    Deliver(TwitchMessage),
    /// Acknowledge once every earlier delivery has been routed.
    Flush(oneshot::Sender<()>),
    /// Shut down the service.
    Shutdown,
}

/// The async Twitch service that runs as a tokio task.
///
/// Routes inbound chat into the daemon's message bus (as [`Envelope`]s) and
/// queues outbound envelopes from the bus for the transport to post.
pub struct TwitchService {
    nick: String,
    /// Joined channel keys.
    channels: HashSet<String>,
    command_rx: mpsc::Receiver<ServiceCommand>,
    bus_tx: broadcast::Sender<Envelope>,
    bus_rx: broadcast::Receiver<Envelope>,
    outgoing_tx: mpsc::Sender<TwitchMessage>,
    rate_limiter: RateLimiter,
}

/// Handle for interacting with a running [`TwitchService`].
#[derive(Clone)]
pub struct TwitchServiceHandle {
    command_tx: mpsc::Sender<ServiceCommand>,
}

impl TwitchServiceHandle {
    /// Hand a received chat message to the service.
    pub async fn deliver(&self, msg: TwitchMessage) -> Result<(), TwitchError> {
        self.command_tx
            .send(ServiceCommand::Deliver(msg))
            .await
            .map_err(|_| TwitchError::SendFailed("service channel closed".to_string()))
    }

    /// Wait until every message delivered so far has been routed.
    pub async fn flush(&self) -> Result<(), TwitchError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.command_tx
            .send(ServiceCommand::Flush(ack_tx))
            .await
            .map_err(|_| TwitchError::SendFailed("service channel closed".to_string()))?;
        ack_rx
            .await
            .map_err(|_| TwitchError::SendFailed("service stopped before flushing".to_string()))
    }

    /// Request the service to shut down.
    pub async fn shutdown(&self) -> Result<(), TwitchError> {
        self.command_tx
            .send(ServiceCommand::Shutdown)
            .await
            .map_err(|_| TwitchError::SendFailed("service channel closed".to_string()))
    }
}

impl TwitchService {
    /// Create a service for the configured channels.
    ///
    /// Returns the service, a handle for the transport to deliver inbound
    /// chat, and the queue of messages the transport should post.
    pub fn new(
        bus_tx: broadcast::Sender<Envelope>,
        config: &AppConfig,
    ) -> (Self, TwitchServiceHandle, mpsc::Receiver<TwitchMessage>) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(256);

        let service = Self {
            nick: config.bot.nick.to_lowercase(),
            channels: config.bot.channels.iter().map(|c| channel_key(c)).collect(),
            command_rx,
            bus_rx: bus_tx.subscribe(),
            bus_tx,
            outgoing_tx,
            rate_limiter: RateLimiter::new(RateLimitConfig::from(&config.twitch)),
        };

        (service, TwitchServiceHandle { command_tx }, outgoing_rx)
    }

    /// Run the service event loop until shutdown.
    pub async fn run(mut self) {
        info!(channels = self.channels.len(), "Twitch service started");

        let mut sweep = tokio::time::interval(RATE_LIMIT_SWEEP);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Pending replies are queued before a shutdown is honoured
            tokio::select! {
                biased;
                received = self.bus_rx.recv() => match received {
                    Ok(envelope) if envelope.direction == Direction::Outbound => {
                        self.handle_outbound(envelope);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Twitch service lagged behind the message bus");
                    }
                    Err(RecvError::Closed) => break,
                },
                cmd = self.command_rx.recv() => match cmd {
                    Some(ServiceCommand::Deliver(msg)) => {
                        if let Err(e) = self.process_inbound(&msg) {
                            debug!(channel = %msg.channel, sender = %msg.sender, error = %e, "Inbound message dropped");
                        }
                    }
                    Some(ServiceCommand::Flush(ack)) => {
                        let _ = ack.send(());
                    }
                    Some(ServiceCommand::Shutdown) | None => {
                        info!("Twitch service shutting down");
                        break;
                    }
                },
                _ = sweep.tick() => {
                    self.rate_limiter.cleanup();
                    debug!(tracked = self.rate_limiter.tracked(), "Rate-limit buckets swept");
                }
            }
        }

        info!("Twitch service stopped");
    }

    /// Route a received chat message onto the bus.
    ///
    /// The bot's own messages are ignored. Messages from channels the bot has
    /// not joined and from throttled chatters are rejected.
    pub fn process_inbound(&mut self, msg: &TwitchMessage) -> Result<(), TwitchError> {
        if msg.sender.eq_ignore_ascii_case(&self.nick) {
            return Ok(());
        }
        let channel = channel_key(&msg.channel);
        if !self.channels.contains(&channel) {
            return Err(TwitchError::NotJoined(channel));
        }
        if !self.rate_limiter.check(&msg.sender) {
            warn!(channel = %channel, sender = %msg.sender, "Rate limited");
            return Err(TwitchError::RateLimited(msg.sender.clone()));
        }

        let _ = self.bus_tx.send(msg.to_envelope());
        debug!(channel = %channel, sender = %msg.sender, "Inbound chat routed to bus");
        Ok(())
    }

    /// Queue a reply for the transport. A full queue drops the reply so a
    /// stalled transport never blocks inbound routing.
    fn handle_outbound(&self, envelope: Envelope) {
        let channel = channel_key(&envelope.channel);
        if !self.channels.contains(&channel) {
            return;
        }
        let msg = TwitchMessage::outbound(&format!("#{channel}"), &envelope.body);
        match self.outgoing_tx.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(channel = %channel, "Outgoing queue full, reply dropped");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(channel = %channel, "Outgoing queue closed, reply dropped");
            }
        }
    }
}
