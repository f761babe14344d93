//! Rune-level estimation from an observed rune reward.
//!
//! Defeating another player pays out a fixed share of the runes that player
//! needs for their next level: 4% when you are the host or a cooperating
//! phantom, 15% for the invader family. Inverting that payout against the
//! level progression table gives an estimate of the opponent's level.
//!
//! [`LevelTables::parse`] builds both lookup tables from the progression
//! dataset, and [`closest`] finds the nearest known payout for an observed
//! amount.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The progression dataset bundled with the crate.
const BUNDLED_DATA: &str = include_str!("../data/rune_levels.txt");

/// Highest reachable level; its line terminates the dataset.
pub const MAX_LEVEL: u32 = 713;

/// Placeholder reward on the [`MAX_LEVEL`] line.
const SENTINEL_REWARD: &str = "-";

/// Percent of the next-level cost paid to a host or phantom.
pub const HOST_REWARD_PERCENT: u64 = 4;

/// Percent of the next-level cost paid to the invader family.
pub const INVADER_REWARD_PERCENT: u64 = 15;

/// Errors from building the level tables. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("level data line {line}: {message}")]
    Integrity { line: usize, message: String },

    #[error("level data ended without the level 713 sentinel")]
    MissingSentinel,
}

impl LevelError {
    fn at(line: usize, message: impl Into<String>) -> Self {
        Self::Integrity {
            line,
            message: message.into(),
        }
    }
}

/// Find the element of `sorted` nearest to `query`.
///
/// `sorted` must be ascending. Values below the first element clamp to it,
/// values above the last clamp to the last, and an exact tie between two
/// neighbours resolves to the smaller one. Returns `None` only for an empty
/// slice.
pub fn closest(sorted: &[u64], query: u64) -> Option<u64> {
    let first = *sorted.first()?;
    let pos = sorted.partition_point(|&value| value < query);
    if pos == 0 {
        return Some(first);
    }
    if pos == sorted.len() {
        return sorted.last().copied();
    }

    let before = sorted[pos - 1];
    let after = sorted[pos];
    if after - query < query - before {
        Some(after)
    } else {
        Some(before)
    }
}

/// The role the observer played when the reward was paid.
///
/// Only the invader family pays at the higher rate; every other role uses
/// the host table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Host,
    Phantom,
    Cooperator,
    Hunter,
    Invader,
    BloodyFinger,
    Recusant,
}

impl Role {
    /// Every accepted role, in display order.
    pub const ALL: [Role; 7] = [
        Role::Host,
        Role::Phantom,
        Role::Cooperator,
        Role::Hunter,
        Role::Invader,
        Role::BloodyFinger,
        Role::Recusant,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Host => "host",
            Role::Phantom => "phantom",
            Role::Cooperator => "cooperator",
            Role::Hunter => "hunter",
            Role::Invader => "invader",
            Role::BloodyFinger => "bloody-finger",
            Role::Recusant => "recusant",
        }
    }

    /// Whether this role is paid at the invader rate.
    pub fn is_invader(self) -> bool {
        matches!(self, Role::Invader | Role::BloodyFinger | Role::Recusant)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role token outside the accepted set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase().replace('_', "-");
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == token)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// A single payout table: reward threshold → estimated level.
#[derive(Debug, Clone, Default)]
pub struct LevelTable {
    thresholds: Vec<u64>,
    levels: Vec<u32>,
}

impl LevelTable {
    fn from_map(map: BTreeMap<u64, u32>) -> Self {
        let (thresholds, levels) = map.into_iter().unzip();
        Self { thresholds, levels }
    }

    /// Thresholds in ascending order.
    pub fn thresholds(&self) -> &[u64] {
        &self.thresholds
    }

    /// Level recorded for an exact threshold.
    pub fn level_at(&self, threshold: u64) -> Option<u32> {
        self.thresholds
            .binary_search(&threshold)
            .ok()
            .map(|i| self.levels[i])
    }

    /// Nearest threshold to `runes` and its level.
    pub fn nearest(&self, runes: u64) -> Option<(u64, u32)> {
        let threshold = closest(&self.thresholds, runes)?;
        self.level_at(threshold).map(|level| (threshold, level))
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }
}

/// Result of a level lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Estimate {
    pub runes: u64,
    pub role: Role,
    /// The table entry nearest to `runes`.
    pub threshold: u64,
    pub level: u32,
}

/// Host and invader payout tables.
#[derive(Debug, Clone)]
pub struct LevelTables {
    host: LevelTable,
    invader: LevelTable,
}

impl LevelTables {
    /// Build the tables from the dataset shipped with the crate.
    pub fn bundled() -> Result<Self, LevelError> {
        Self::parse(BUNDLED_DATA)
    }

    /// Build the tables from `<level> <reward> ...` lines.
    ///
    /// Blank lines and `#` comments are skipped. The data must end with the
    /// [`MAX_LEVEL`] line whose reward is exactly `-`. When two levels scale
    /// to the same payout, the later line wins.
    pub fn parse(data: &str) -> Result<Self, LevelError> {
        let mut host = BTreeMap::new();
        let mut invader = BTreeMap::new();
        let mut sentinel_seen = false;

        for (index, raw) in data.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if sentinel_seen {
                return Err(LevelError::at(line_no, "data after the sentinel line"));
            }

            let mut fields = line.split_whitespace();
            let level: u32 = fields
                .next()
                .and_then(|f| f.parse().ok())
                .ok_or_else(|| LevelError::at(line_no, "missing or invalid level"))?;
            let reward = fields
                .next()
                .ok_or_else(|| LevelError::at(line_no, "missing reward"))?;

            if level == MAX_LEVEL {
                if reward != SENTINEL_REWARD {
                    return Err(LevelError::at(
                        line_no,
                        format!(
                            "level {MAX_LEVEL} reward must be {SENTINEL_REWARD:?}, got {reward:?}"
                        ),
                    ));
                }
                sentinel_seen = true;
                continue;
            }
            if level > MAX_LEVEL {
                return Err(LevelError::at(
                    line_no,
                    format!("level {level} is above the {MAX_LEVEL} cap"),
                ));
            }

            let reward: u64 = reward.parse().map_err(|_| {
                LevelError::at(line_no, format!("invalid reward {reward:?} for level {level}"))
            })?;
            let scale = |percent: u64| {
                reward
                    .checked_mul(percent)
                    .map(|v| v / 100)
                    .ok_or_else(|| LevelError::at(line_no, format!("reward {reward} is too large")))
            };
            let next = level + 1;
            host.insert(scale(HOST_REWARD_PERCENT)?, next);
            invader.insert(scale(INVADER_REWARD_PERCENT)?, next);
        }

        if !sentinel_seen {
            return Err(LevelError::MissingSentinel);
        }

        Ok(Self {
            host: LevelTable::from_map(host),
            invader: LevelTable::from_map(invader),
        })
    }

    pub fn host(&self) -> &LevelTable {
        &self.host
    }

    pub fn invader(&self) -> &LevelTable {
        &self.invader
    }

    /// The table that pays `role`.
    pub fn table(&self, role: Role) -> &LevelTable {
        if role.is_invader() {
            &self.invader
        } else {
            &self.host
        }
    }

    /// Estimate the opponent's level from the runes received.
    pub fn estimate(&self, runes: u64, role: Option<Role>) -> Option<Estimate> {
        let role = role.unwrap_or_default();
        let (threshold, level) = self.table(role).nearest(runes)?;
        Some(Estimate {
            runes,
            role,
            threshold,
            level,
        })
    }
}
