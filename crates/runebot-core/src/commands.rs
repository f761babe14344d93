//! Chat command parsing.
//!
//! A command is the configured prefix followed by a command word
//! (case-insensitive) and free-form arguments. Each command maps to an
//! (action, resource) pair that the policy engine authorizes.

/// Reply when a status command runs with no current build.
pub const NO_BUILD: &str = "No build set.";
/// Reply when the inventory service could not produce a build.
pub const FETCH_FAILED: &str = "Could not fetch that build.";
/// Reply when the build store could not be written.
pub const SAVE_FAILED: &str = "Could not save builds, try again later.";
/// Reply when the counter store could not be written.
pub const COUNTER_SAVE_FAILED: &str = "Could not save disconnects, try again later.";

/// What a command does to its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Write,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
        }
    }
}

/// What a command touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Chat,
    Builds,
    Levels,
    Counters,
}

impl Resource {
    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Chat => "chat",
            Resource::Builds => "builds",
            Resource::Levels => "levels",
            Resource::Counters => "counters",
        }
    }
}

/// A recognized chat command with its raw argument text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Hi,
    AddBuild(&'a str),
    AddBuildFromText(&'a str),
    RemoveBuild(&'a str),
    SetBuild(&'a str),
    Build,
    RuneLevel,
    Stats,
    Builds,
    Level(&'a str),
    Disconnects,
    AddDisconnect,
    SetDisconnects(&'a str),
}

impl<'a> Command<'a> {
    /// Parse a chat line. Returns `None` for anything that is not a known
    /// command.
    pub fn parse(prefix: &str, body: &'a str) -> Option<Self> {
        let rest = body.trim().strip_prefix(prefix)?;
        let (word, args) = rest
            .split_once(char::is_whitespace)
            .unwrap_or((rest, ""));
        let args = args.trim();

        let command = match word.to_ascii_lowercase().as_str() {
            "hi" => Command::Hi,
            "addbuild" => Command::AddBuild(args),
            "addbuildfromtext" => Command::AddBuildFromText(args),
            "removebuild" => Command::RemoveBuild(args),
            "setbuild" => Command::SetBuild(args),
            "build" => Command::Build,
            "rl" | "sl" => Command::RuneLevel,
            "stats" => Command::Stats,
            "builds" => Command::Builds,
            "level" => Command::Level(args),
            "dc" => Command::Disconnects,
            "adddc" => Command::AddDisconnect,
            "setdc" => Command::SetDisconnects(args),
            _ => return None,
        };
        Some(command)
    }

    /// Canonical command word, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Hi => "hi",
            Command::AddBuild(_) => "addbuild",
            Command::AddBuildFromText(_) => "addbuildfromtext",
            Command::RemoveBuild(_) => "removebuild",
            Command::SetBuild(_) => "setbuild",
            Command::Build => "build",
            Command::RuneLevel => "rl",
            Command::Stats => "stats",
            Command::Builds => "builds",
            Command::Level(_) => "level",
            Command::Disconnects => "dc",
            Command::AddDisconnect => "adddc",
            Command::SetDisconnects(_) => "setdc",
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Command::AddBuild(_)
            | Command::AddBuildFromText(_)
            | Command::RemoveBuild(_)
            | Command::SetBuild(_)
            | Command::AddDisconnect
            | Command::SetDisconnects(_) => Action::Write,
            _ => Action::Read,
        }
    }

    pub fn resource(&self) -> Resource {
        match self {
            Command::Hi => Resource::Chat,
            Command::Level(_) => Resource::Levels,
            Command::Disconnects | Command::AddDisconnect | Command::SetDisconnects(_) => {
                Resource::Counters
            }
            _ => Resource::Builds,
        }
    }
}

/// Parse a non-negative amount, allowing `_` and `,` as digit separators.
pub fn parse_amount(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(|c| !matches!(c, '_' | ',')).collect();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Strip one pair of surrounding double quotes from a build name argument.
pub fn unquote(name: &str) -> &str {
    let name = name.trim();
    name.strip_prefix('"')
        .and_then(|n| n.strip_suffix('"'))
        .map_or(name, str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("!", "!hi"), Some(Command::Hi));
        assert_eq!(Command::parse("!", "  !BUILD  "), Some(Command::Build));
        assert_eq!(Command::parse("!", "!sl"), Some(Command::RuneLevel));
        assert_eq!(
            Command::parse("!", "!removebuild  Dex Katana "),
            Some(Command::RemoveBuild("Dex Katana"))
        );
        assert_eq!(
            Command::parse("!", "!level 1,200 invader"),
            Some(Command::Level("1,200 invader"))
        );
        assert_eq!(
            Command::parse("?", "?setdc 4"),
            Some(Command::SetDisconnects("4"))
        );
    }

    #[test]
    fn test_non_commands_ignored() {
        assert_eq!(Command::parse("!", "hi there"), None);
        assert_eq!(Command::parse("!", "!unknown"), None);
        assert_eq!(Command::parse("!", "!"), None);
        assert_eq!(Command::parse("!", "!buildx"), None);
        assert_eq!(Command::parse("?", "!hi"), None);
    }

    #[test]
    fn test_authorization_mapping() {
        let cmd = Command::parse("!", "!addbuild x").unwrap();
        assert_eq!((cmd.action(), cmd.resource()), (Action::Write, Resource::Builds));

        let cmd = Command::parse("!", "!adddc").unwrap();
        assert_eq!((cmd.action(), cmd.resource()), (Action::Write, Resource::Counters));

        let cmd = Command::parse("!", "!level 10").unwrap();
        assert_eq!((cmd.action(), cmd.resource()), (Action::Read, Resource::Levels));

        assert_eq!(Command::Hi.resource().as_str(), "chat");
        assert_eq!(Command::Stats.action().as_str(), "read");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1200"), Some(1200));
        assert_eq!(parse_amount("1_200"), Some(1200));
        assert_eq!(parse_amount("1,200,000"), Some(1_200_000));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("_"), None);
        assert_eq!(parse_amount("-5"), None);
        assert_eq!(parse_amount("12k"), None);
        assert_eq!(parse_amount("99999999999999999999999"), None);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"Dex Katana\""), "Dex Katana");
        assert_eq!(unquote(" plain "), "plain");
        assert_eq!(unquote("\"open"), "\"open");
    }
}
