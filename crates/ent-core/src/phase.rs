//! Session lifecycle phases.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a session.
///
/// Persisted as an uppercase string. Unrecognized strings from older or
/// newer state files deserialize to [`Phase::Idle`] rather than failing the
/// load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No agent work in progress.
    #[default]
    Idle,
    /// Agent mid-turn.
    Active,
    /// Agent signalled session stop.
    Ended,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Active => "ACTIVE",
            Self::Ended => "ENDED",
        }
    }

    /// Parse a persisted phase string, coercing anything unrecognized to
    /// `Idle` (backward compatibility with retired phase names).
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "ACTIVE" => Self::Active,
            "ENDED" => Self::Ended,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Phase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Phase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Phase::parse_lenient(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for phase in [Phase::Idle, Phase::Active, Phase::Ended] {
            let json = serde_json::to_string(&phase).unwrap();
            let back: Phase = serde_json::from_str(&json).unwrap();
            assert_eq!(back, phase);
        }
    }

    #[test]
    fn test_unknown_string_coerces_to_idle() {
        let back: Phase = serde_json::from_str("\"SUSPENDED\"").unwrap();
        assert_eq!(back, Phase::Idle);
    }

    #[test]
    fn test_display_matches_persisted_form() {
        assert_eq!(Phase::Active.to_string(), "ACTIVE");
        assert_eq!(serde_json::to_string(&Phase::Active).unwrap(), "\"ACTIVE\"");
    }
}
