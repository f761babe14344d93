//! Twitch chat message types.

use std::time::SystemTime;

use runebot_core::message::{ChatRole, Envelope};

/// A chat badge such as `moderator/1` or `subscriber/12`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub name: String,
    pub version: String,
}

impl Badge {
    /// Parse a `badges` tag value (`name/version,name/version`). Malformed
    /// entries are skipped.
    pub fn parse_list(raw: &str) -> Vec<Badge> {
        raw.split(',')
            .filter_map(|entry| {
                let (name, version) = entry.trim().split_once('/')?;
                (!name.is_empty()).then(|| Badge {
                    name: name.to_string(),
                    version: version.to_string(),
                })
            })
            .collect()
    }
}

/// A message received from or posted to a Twitch channel.
#[derive(Debug, Clone)]
pub struct TwitchMessage {
    /// Channel name, with or without the leading `#`.
    pub channel: String,

    /// Sender login; empty for outbound messages.
    pub sender: String,

    /// Badges the sender carries in this channel.
    pub badges: Vec<Badge>,

    /// Message text.
    pub body: String,

    /// Timestamp of the message.
    pub timestamp: SystemTime,
}

impl TwitchMessage {
    /// Create an inbound chat message.
    pub fn text(channel: &str, sender: &str, body: &str) -> Self {
        Self {
            channel: channel.to_string(),
            sender: sender.to_string(),
            badges: Vec::new(),
            body: body.to_string(),
            timestamp: SystemTime::now(),
        }
    }

    /// Create an outbound message for `channel`.
    pub fn outbound(channel: &str, body: &str) -> Self {
        Self::text(channel, "", body)
    }

    pub fn with_badges(mut self, badges: &str) -> Self {
        self.badges = Badge::parse_list(badges);
        self
    }

    pub fn has_badge(&self, name: &str) -> bool {
        self.badges.iter().any(|b| b.name == name)
    }

    /// The sender's standing, derived from badges.
    pub fn role(&self) -> ChatRole {
        if self.has_badge("broadcaster") {
            ChatRole::Broadcaster
        } else if self.has_badge("moderator") {
            ChatRole::Moderator
        } else {
            ChatRole::Viewer
        }
    }

    /// Convert to an inbound bus envelope.
    pub fn to_envelope(&self) -> Envelope {
        Envelope::new(&self.channel, &self.sender, &self.body).with_role(self.role())
    }
}
