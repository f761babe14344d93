#![deny(unsafe_code)]

//! Twitch chat adapter for runebot.
//!
//! This crate bridges a chat transport and the runebot daemon. Messages the
//! transport receives are rate-limited and routed into the daemon's message
//! bus; replies published on the bus are queued back for the transport to
//! post. The transport itself (IRC connection, login) plugs in through
//! [`service::TwitchServiceHandle`] and the outgoing queue.

/// Chat message model and badge-derived roles.
pub mod message;
/// Per-sender token-bucket rate limiting.
pub mod rate_limit;
/// Async service bridging the transport and the message bus.
pub mod service;

pub use message::TwitchMessage;
pub use service::{TwitchService, TwitchServiceHandle};

/// Errors from the Twitch adapter.
#[derive(Debug, thiserror::Error)]
pub enum TwitchError {
    #[error("sender {0} exceeded the rate limit")]
    RateLimited(String),

    #[error("channel {0} is not joined")]
    NotJoined(String),

    #[error("message send failed: {0}")]
    SendFailed(String),
}
