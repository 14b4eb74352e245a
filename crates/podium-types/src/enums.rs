//! Enumerations shared across the leaderboard engine.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Supported game modes for score submission.
///
/// The mode is recorded on every [`ScoreEvent`](crate::ScoreEvent) but does
/// not affect ranking -- all modes feed the same global leaderboard.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum GameMode {
    /// Standard untimed play.
    #[default]
    Classic,
    /// Competitive matchmade play.
    Ranked,
    /// Bracketed tournament play.
    Tournament,
    /// Endless survival play.
    Survival,
}

impl GameMode {
    /// Return the lowercase string form used on the wire and in the database.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Ranked => "ranked",
            Self::Tournament => "tournament",
            Self::Survival => "survival",
        }
    }

    /// Parse the lowercase string form. Returns `None` for unknown modes.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "classic" => Some(Self::Classic),
            "ranked" => Some(Self::Ranked),
            "tournament" => Some(Self::Tournament),
            "survival" => Some(Self::Survival),
            _ => None,
        }
    }
}

impl core::fmt::Display for GameMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_lowercase() {
        let json = serde_json::to_string(&GameMode::Tournament).unwrap_or_default();
        assert_eq!(json, "\"tournament\"");
    }

    #[test]
    fn parse_roundtrip() {
        for mode in [
            GameMode::Classic,
            GameMode::Ranked,
            GameMode::Tournament,
            GameMode::Survival,
        ] {
            assert_eq!(GameMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(GameMode::parse("speedrun"), None);
    }
}
