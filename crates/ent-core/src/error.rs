/// Error kinds the engine branches on.
///
/// Best-effort paths (post-commit, turn finalization) match on these to
/// decide whether to skip a session and continue; user-initiated paths
/// bubble them up through `anyhow` with context.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("session state for '{session_id}' is corrupted: {reason}")]
    StateCorruption { session_id: String, reason: String },

    #[error("no session with ID '{0}'")]
    SessionNotFound(String),

    #[error("git object write failed: {0}")]
    GitObjectWrite(String),

    #[error("condense failed: {reason}")]
    CondenseFailed { reason: String, retryable: bool },

    #[error("invalid checkpoint ID '{0}': expected 12 lowercase hex characters")]
    InvalidCheckpointId(String),

    #[error("no checkpoint with ID '{0}'")]
    CheckpointNotFound(String),
}
