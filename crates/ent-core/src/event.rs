//! Normalized lifecycle events.
//!
//! Agent adapters parse their native hook payloads into this single shape so
//! the transition table never sees agent-specific structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of lifecycle event, independent of which agent produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TurnStart,
    TurnEnd,
    GitCommit,
    SessionStart,
    SessionStop,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TurnStart => "turn_start",
            Self::TurnEnd => "turn_end",
            Self::GitCommit => "git_commit",
            Self::SessionStart => "session_start",
            Self::SessionStop => "session_stop",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One normalized hook event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookEvent {
    pub kind: EventKind,

    /// Opaque session identifier supplied by the agent.
    pub session_id: String,

    /// Agent-native session reference, typically the transcript path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_ref: Option<String>,

    /// User prompt text, when the event carries one (turn start).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Event time as reported by the agent; `None` means "now".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl HookEvent {
    pub fn new(kind: EventKind, session_id: impl Into<String>) -> Self {
        Self {
            kind,
            session_id: session_id.into(),
            session_ref: None,
            prompt: None,
            timestamp: None,
        }
    }

    /// The effective event time.
    pub fn effective_time(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&EventKind::TurnStart).unwrap();
        assert_eq!(json, "\"turn_start\"");
    }

    #[test]
    fn test_event_round_trip() {
        let mut event = HookEvent::new(EventKind::SessionStop, "s-1");
        event.session_ref = Some("/tmp/t.jsonl".into());
        let json = serde_json::to_string(&event).unwrap();
        let back: HookEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, EventKind::SessionStop);
        assert_eq!(back.session_id, "s-1");
        assert_eq!(back.session_ref.as_deref(), Some("/tmp/t.jsonl"));
    }
}
