//! Character builds — the records moderators register and chat queries.
//!
//! A [`Build`] is immutable once constructed. It comes from one of two
//! places: free text typed in chat ([`Build::parse_text`]) or a record
//! fetched from the inventory service ([`Build::from_record`]).

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::inventory::FetchError;

/// Errors from constructing a build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Malformed free text or an inventory record with missing/invalid fields.
    #[error("Invalid build: {0}")]
    Parse(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl BuildError {
    fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }
}

const TEXT_USAGE: &str = "expected <name> <rune level> <upgrade level> [link]";

/// The eight character attributes.
///
/// Serialized with the inventory service's short keys so records fetched
/// from it and records written by the bot share one layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(rename = "vig")]
    pub vigor: u32,
    #[serde(rename = "mnd")]
    pub mind: u32,
    #[serde(rename = "vit")]
    pub endurance: u32,
    #[serde(rename = "str")]
    pub strength: u32,
    #[serde(rename = "dex")]
    pub dexterity: u32,
    #[serde(rename = "int")]
    pub intelligence: u32,
    #[serde(rename = "fth")]
    pub faith: u32,
    #[serde(rename = "arc")]
    pub arcane: u32,
}

impl Stats {
    /// `VIG 40 MND 20 END 25 STR 16 DEX 18 INT 9 FTH 30 ARC 7`
    pub fn describe(&self) -> String {
        format!(
            "VIG {} MND {} END {} STR {} DEX {} INT {} FTH {} ARC {}",
            self.vigor,
            self.mind,
            self.endurance,
            self.strength,
            self.dexterity,
            self.intelligence,
            self.faith,
            self.arcane,
        )
    }

    fn from_record(stats: &Value) -> Result<Self, BuildError> {
        let field = |key: &str| record_u32(stats, key, &format!("stats.{key}"));
        Ok(Self {
            vigor: field("vig")?,
            mind: field("mnd")?,
            endurance: field("vit")?,
            strength: field("str")?,
            dexterity: field("dex")?,
            intelligence: field("int")?,
            faith: field("fth")?,
            arcane: field("arc")?,
        })
    }
}

/// A named snapshot of a character's level, upgrades, and attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    name: String,
    rune_level: u32,
    weapon_upgrade_level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    somber_upgrade_level: Option<u32>,
    #[serde(default)]
    link: String,
    #[serde(default)]
    stats: Option<Stats>,
}

impl Build {
    /// Create a build with no link, no stats, and a derived somber level.
    pub fn new(
        name: impl Into<String>,
        rune_level: u32,
        weapon_upgrade_level: u32,
    ) -> Result<Self, BuildError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(BuildError::parse("build name must not be empty"));
        }
        Ok(Self {
            name,
            rune_level,
            weapon_upgrade_level,
            somber_upgrade_level: None,
            link: String::new(),
            stats: None,
        })
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    pub fn with_stats(mut self, stats: Stats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Record a somber level instead of deriving it from the regular one.
    pub fn with_somber_upgrade_level(mut self, level: u32) -> Self {
        self.somber_upgrade_level = Some(level);
        self
    }

    /// Parse the arguments of `!addbuildfromtext`.
    ///
    /// `<name> <rune level> <upgrade level> [link]`, where a name starting
    /// with `"` runs until the first token ending in `"`. The upgrade level
    /// may carry an explicit somber level as `25/10` or `+25/+10`.
    pub fn parse_text(args: &str) -> Result<Self, BuildError> {
        let tokens: Vec<&str> = args.split_whitespace().collect();
        let Some((name, rest)) = split_name(&tokens) else {
            return Err(BuildError::parse(TEXT_USAGE));
        };
        let [rune_level, upgrade, extra @ ..] = rest else {
            return Err(BuildError::parse(TEXT_USAGE));
        };
        let link = match extra {
            [] => None,
            [link] => Some(*link),
            _ => return Err(BuildError::parse(TEXT_USAGE)),
        };

        let rune_level = parse_number("rune level", rune_level)?;
        let (regular, somber) = parse_upgrade(upgrade)?;

        let mut build = Build::new(name, rune_level, regular)?;
        if let Some(somber) = somber {
            build = build.with_somber_upgrade_level(somber);
        }
        if let Some(link) = link {
            build = build.with_link(link);
        }
        Ok(build)
    }

    /// Build from an inventory service record.
    ///
    /// Reads `name`, `stats.rl`, `weaponUpgrade` (number or numeric string)
    /// and the eight attributes under `stats`; any missing or invalid field
    /// is a [`BuildError::Parse`]. `link` is where the record came from.
    pub fn from_record(record: &Value, link: &str) -> Result<Self, BuildError> {
        let name = record
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| BuildError::parse("record is missing field `name`"))?;
        let stats_value = record
            .get("stats")
            .filter(|v| v.is_object())
            .ok_or_else(|| BuildError::parse("record is missing field `stats`"))?;

        let rune_level = record_u32(stats_value, "rl", "stats.rl")?;
        let weapon_upgrade_level = record_u32(record, "weaponUpgrade", "weaponUpgrade")?;
        let stats = Stats::from_record(stats_value)?;

        Ok(Build::new(name, rune_level, weapon_upgrade_level)?
            .with_link(link)
            .with_stats(stats))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rune_level(&self) -> u32 {
        self.rune_level
    }

    pub fn weapon_upgrade_level(&self) -> u32 {
        self.weapon_upgrade_level
    }

    /// The recorded somber level, or `ceil(regular / 2.5)`.
    pub fn somber_upgrade_level(&self) -> u32 {
        self.somber_upgrade_level
            .unwrap_or_else(|| derived_somber(self.weapon_upgrade_level))
    }

    pub fn link(&self) -> Option<&str> {
        (!self.link.is_empty()).then_some(self.link.as_str())
    }

    pub fn stats(&self) -> Option<&Stats> {
        self.stats.as_ref()
    }

    /// `<name> RL<level> +<regular>/+<somber>`, plus ` Link: <link>` when
    /// the build has one.
    pub fn describe(&self) -> String {
        let mut out = format!(
            "{} RL{} +{}/+{}",
            self.name,
            self.rune_level,
            self.weapon_upgrade_level,
            self.somber_upgrade_level()
        );
        if let Some(link) = self.link() {
            let _ = write!(out, " Link: {link}");
        }
        out
    }

    /// Attribute summary, or `None` when the build has no stats.
    pub fn describe_stats(&self) -> Option<String> {
        self.stats.as_ref().map(Stats::describe)
    }
}

/// Somber weapons top out at +10 where regular ones reach +25.
fn derived_somber(regular: u32) -> u32 {
    let somber = (u64::from(regular) * 2).div_ceil(5);
    u32::try_from(somber).unwrap_or(u32::MAX)
}

/// Split off the name, honouring a leading `"`. The first token ending in
/// `"` closes the name; without one, the name runs to the end.
fn split_name<'t, 'a>(tokens: &'t [&'a str]) -> Option<(String, &'t [&'a str])> {
    let first = tokens.first()?;
    if !first.starts_with('"') {
        return Some((first.to_string(), &tokens[1..]));
    }

    let end = tokens
        .iter()
        .position(|t| t.ends_with('"'))
        .unwrap_or(tokens.len() - 1);
    let joined = tokens[..=end].join(" ");
    let inner = joined.strip_prefix('"').unwrap_or(&joined);
    let inner = inner.strip_suffix('"').unwrap_or(inner);
    Some((inner.to_string(), &tokens[end + 1..]))
}

fn parse_number(field: &str, token: &str) -> Result<u32, BuildError> {
    token
        .trim_start_matches('+')
        .parse()
        .map_err(|_| BuildError::parse(format!("{field} must be a whole number, got {token:?}")))
}

fn parse_upgrade(token: &str) -> Result<(u32, Option<u32>), BuildError> {
    match token.split_once('/') {
        Some((regular, somber)) => Ok((
            parse_number("upgrade level", regular)?,
            Some(parse_number("somber upgrade level", somber)?),
        )),
        None => Ok((parse_number("upgrade level", token)?, None)),
    }
}

/// Read `key` from `object` as a non-negative integer; `path` names the
/// field in error messages.
fn record_u32(object: &Value, key: &str, path: &str) -> Result<u32, BuildError> {
    let value = object
        .get(key)
        .ok_or_else(|| BuildError::parse(format!("record is missing field `{path}`")))?;
    let number = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    number
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| BuildError::parse(format!("field `{path}` is not a whole number")))
}
