//! Per-session persisted state.

use chrono::{DateTime, Utc};
use ent_core::{CheckpointId, Phase};
use serde::{Deserialize, Serialize};

/// Everything the engine remembers about one session, serialized as a
/// single JSON document.
///
/// Unknown top-level keys written by newer versions are kept in `extra` and
/// round-tripped on save; the loader warns about them once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    /// Opaque session identifier supplied by the agent.
    pub session_id: String,

    /// Identifier of the working tree this session is pinned to.
    pub worktree_id: String,

    /// Absolute path of that working tree.
    pub worktree_path: String,

    /// The commit the session's shadow branch anchors on.
    pub base_commit: String,

    /// When this session was first seen.
    pub started_at: DateTime<Utc>,

    /// When the agent signalled session stop, if it has.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    /// Last lifecycle event time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_interaction_time: Option<DateTime<Utc>>,

    /// Lifecycle phase.
    #[serde(default)]
    pub phase: Phase,

    /// Checkpoints on the current shadow branch not yet condensed.
    #[serde(default)]
    pub step_count: u32,

    /// Ordered unique repo-relative paths modified since the last
    /// successful condensation.
    #[serde(default)]
    pub files_touched: Vec<String>,

    /// Transcript line offset; everything before it is already condensed.
    #[serde(default)]
    pub checkpoint_transcript_start: u64,

    /// Most recent checkpoint identifier; cleared by carry-forward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checkpoint_id: Option<CheckpointId>,

    /// Checkpoint IDs created during the current turn, drained when the
    /// turn ends.
    #[serde(default)]
    pub turn_checkpoint_ids: Vec<CheckpointId>,

    /// Absolute path to the agent's transcript file.
    pub transcript_path: String,

    /// Unrecognized keys, preserved verbatim for forward compatibility.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SessionState {
    /// Fresh state for a session first seen now, anchored at `base_commit`.
    pub fn new(
        session_id: impl Into<String>,
        worktree_id: impl Into<String>,
        worktree_path: impl Into<String>,
        base_commit: impl Into<String>,
        transcript_path: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            worktree_id: worktree_id.into(),
            worktree_path: worktree_path.into(),
            base_commit: base_commit.into(),
            started_at: Utc::now(),
            ended_at: None,
            last_interaction_time: None,
            phase: Phase::default(),
            step_count: 0,
            files_touched: Vec::new(),
            checkpoint_transcript_start: 0,
            last_checkpoint_id: None,
            turn_checkpoint_ids: Vec::new(),
            transcript_path: transcript_path.into(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn has_files_touched(&self) -> bool {
        !self.files_touched.is_empty()
    }
}
