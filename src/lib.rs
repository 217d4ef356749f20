pub mod actors;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod monitors;
pub mod relay;
pub mod state;
pub mod telegram;
pub mod template;
pub mod util;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Placeholder name to rendered value, built by the host for a single notify call.
pub type EventPayload = HashMap<String, String>;

/// The kinds of events the relay knows how to announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Join,
    Quit,
    Kick,
    Ban,
    Death,
    Teleport,
    Health,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Join,
        EventKind::Quit,
        EventKind::Kick,
        EventKind::Ban,
        EventKind::Death,
        EventKind::Teleport,
        EventKind::Health,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Join => "join",
            EventKind::Quit => "quit",
            EventKind::Kick => "kick",
            EventKind::Ban => "ban",
            EventKind::Death => "death",
            EventKind::Teleport => "teleport",
            EventKind::Health => "health",
        }
    }

    /// Name used inside configuration keys. Health alerts are configured under `low_tps`.
    pub fn config_name(self) -> &'static str {
        match self {
            EventKind::Health => "low_tps",
            other => other.as_str(),
        }
    }

    /// Key of the boolean that enables this kind, e.g. `messages.enable_join`.
    pub fn flag_key(self) -> String {
        format!("messages.enable_{}", self.config_name())
    }

    /// Key of the message template, e.g. `messages.join`.
    pub fn template_key(self) -> String {
        format!("messages.{}", self.config_name())
    }

    pub fn default_enabled(self) -> bool {
        matches!(self, EventKind::Join | EventKind::Quit)
    }

    pub fn default_template(self) -> &'static str {
        match self {
            EventKind::Join => "[+] {player} joined the server.",
            EventKind::Quit => "[-] {player} left the server.",
            EventKind::Kick => "[ALERT] {player} was kicked: {reason}",
            EventKind::Ban => "[ALERT] {player} is banned: {reason}",
            EventKind::Death => "☠ {player} died to {cause} at {x},{y},{z} in {world}",
            EventKind::Teleport => {
                "↦ {player} teleported {from_world}({from_x},{from_y},{from_z}) → {to_world}({to_x},{to_y},{to_z})"
            }
            EventKind::Health => "⚠ TPS low: {tps1m} (5m: {tps5m}, 15m: {tps15m})",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name an [`EventKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEventKindError(pub String);

impl fmt::Display for ParseEventKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event kind: {}", self.0)
    }
}

impl std::error::Error for ParseEventKindError {}

impl FromStr for EventKind {
    type Err = ParseEventKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "join" => Ok(EventKind::Join),
            "quit" | "leave" => Ok(EventKind::Quit),
            "kick" => Ok(EventKind::Kick),
            "ban" => Ok(EventKind::Ban),
            "death" => Ok(EventKind::Death),
            "teleport" => Ok(EventKind::Teleport),
            "health" | "low_tps" | "tps" => Ok(EventKind::Health),
            _ => Err(ParseEventKindError(s.to_string())),
        }
    }
}
