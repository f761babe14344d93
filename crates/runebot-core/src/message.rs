//! Message types for the runebot message bus.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// A chat message routed through the daemon's message bus.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Unique message identifier.
    pub id: u64,

    /// Timestamp when the message was created.
    pub timestamp: SystemTime,

    /// Chat channel the message belongs to (e.g. "#somestreamer").
    pub channel: String,

    /// Login of the chatter who sent it; empty for bot replies.
    pub sender: String,

    /// The sender's standing in the channel.
    pub role: ChatRole,

    /// Message body.
    pub body: String,

    /// Direction of the message.
    pub direction: Direction,

    /// Id of the inbound message this one answers.
    pub in_reply_to: Option<u64>,
}

/// Whether a message is inbound (from chat) or outbound (to chat).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Message received from a chat channel.
    Inbound,
    /// Message to be posted to a chat channel.
    Outbound,
}

/// A chatter's standing in a channel, used for command authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatRole {
    Broadcaster,
    Moderator,
    #[default]
    Viewer,
}

impl ChatRole {
    /// The role name policy rules match against.
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::Broadcaster => "broadcaster",
            ChatRole::Moderator => "moderator",
            ChatRole::Viewer => "viewer",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "broadcaster" => Ok(ChatRole::Broadcaster),
            "moderator" | "mod" => Ok(ChatRole::Moderator),
            "viewer" => Ok(ChatRole::Viewer),
            other => Err(format!("unknown chat role {other:?}")),
        }
    }
}

impl Envelope {
    /// Create a new inbound message from a viewer.
    pub fn new(channel: &str, sender: &str, body: &str) -> Self {
        Self {
            id: next_id(),
            timestamp: SystemTime::now(),
            channel: channel.to_string(),
            sender: sender.to_string(),
            role: ChatRole::Viewer,
            body: body.to_string(),
            direction: Direction::Inbound,
            in_reply_to: None,
        }
    }

    pub fn with_role(mut self, role: ChatRole) -> Self {
        self.role = role;
        self
    }

    /// Create an outbound response envelope for this message.
    pub fn reply(&self, body: &str) -> Self {
        Self {
            id: next_id(),
            timestamp: SystemTime::now(),
            channel: self.channel.clone(),
            sender: String::new(),
            role: ChatRole::Viewer,
            body: body.to_string(),
            direction: Direction::Outbound,
            in_reply_to: Some(self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_creation() {
        let envelope = Envelope::new("#chan", "alice", "!build");
        assert_eq!(envelope.channel, "#chan");
        assert_eq!(envelope.sender, "alice");
        assert_eq!(envelope.role, ChatRole::Viewer);
        assert_eq!(envelope.direction, Direction::Inbound);
        assert!(envelope.id > 0);
    }

    #[test]
    fn test_envelope_reply() {
        let original = Envelope::new("#chan", "alice", "!hi").with_role(ChatRole::Moderator);
        let reply = original.reply("Ayo @alice!");
        assert_eq!(reply.channel, "#chan");
        assert_eq!(reply.body, "Ayo @alice!");
        assert_eq!(reply.direction, Direction::Outbound);
        assert_eq!(reply.in_reply_to, Some(original.id));
        assert_ne!(reply.id, original.id);
    }

    #[test]
    fn test_unique_ids() {
        let a = Envelope::new("a", "x", "1");
        let b = a.reply("2");
        let c = Envelope::new("b", "y", "3");
        assert!(a.id < b.id && b.id < c.id);
    }

    #[test]
    fn test_chat_role_parse() {
        assert_eq!("Moderator".parse::<ChatRole>(), Ok(ChatRole::Moderator));
        assert_eq!("mod".parse::<ChatRole>(), Ok(ChatRole::Moderator));
        assert_eq!("broadcaster".parse::<ChatRole>(), Ok(ChatRole::Broadcaster));
        assert!("vip".parse::<ChatRole>().is_err());
    }
}
