//! Token-bucket rate limiter for chat spam protection.
//!
//! Limits how many messages each chatter can get processed within a time
//! window. Chatters are keyed by lowercase login.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use runebot_config::TwitchConfig;

/// Configuration for the rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum tokens (messages) per chatter.
    pub max_tokens: u32,

    /// One token is refilled per this duration.
    pub refill_interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_tokens: 20,
            refill_interval: Duration::from_secs(3),
        }
    }
}

impl From<&TwitchConfig> for RateLimitConfig {
    fn from(config: &TwitchConfig) -> Self {
        Self {
            max_tokens: config.rate_limit_max,
            refill_interval: Duration::from_secs(config.rate_limit_refill_secs),
        }
    }
}

struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, config: &RateLimitConfig) {
        let interval = config.refill_interval.as_millis().max(1);
        let elapsed = now.saturating_duration_since(self.last_refill);
        let refills = u32::try_from(elapsed.as_millis() / interval).unwrap_or(u32::MAX);
        if refills > 0 {
            self.tokens = self.tokens.saturating_add(refills).min(config.max_tokens);
            self.last_refill = now;
        }
    }
}

/// A token-bucket rate limiter keyed by chatter login.
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: HashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: HashMap::new(),
        }
    }

    /// Whether a message from `sender` may be processed now. Consumes one
    /// token when allowed.
    pub fn check(&mut self, sender: &str) -> bool {
        self.check_at(sender, Instant::now())
    }

    fn check_at(&mut self, sender: &str, now: Instant) -> bool {
        let bucket = self
            .buckets
            .entry(sender.to_lowercase())
            .or_insert(Bucket {
                tokens: self.config.max_tokens,
                last_refill: now,
            });
        bucket.refill(now, &self.config);

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Tokens left for `sender`.
    pub fn remaining(&self, sender: &str) -> u32 {
        self.buckets
            .get(&sender.to_lowercase())
            .map_or(self.config.max_tokens, |b| b.tokens)
    }

    /// Drop buckets that have refilled to full capacity. A chatter without a
    /// bucket starts full, so this never changes what [`check`](Self::check)
    /// allows.
    pub fn cleanup(&mut self) {
        self.cleanup_at(Instant::now());
    }

    fn cleanup_at(&mut self, now: Instant) {
        let config = &self.config;
        self.buckets.retain(|_, bucket| {
            bucket.refill(now, config);
            bucket.tokens < config.max_tokens
        });
    }

    /// Chatters currently tracked.
    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
