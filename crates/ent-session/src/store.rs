//! Durable session records, one JSON file per session.

use crate::state::SessionState;
use anyhow::{Context, Result};
use ent_core::EngineError;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory inside the git common dir holding the per-session files.
pub const SESSIONS_DIR_NAME: &str = "entire-sessions";

/// Store of per-session state files.
///
/// Saves are atomic (write `<id>.json.tmp`, then rename); there are no
/// caches, so readers always observe the latest rename.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Open the store for a repository's git common dir.
    pub fn open(git_common_dir: &Path) -> Self {
        Self {
            dir: git_common_dir.join(SESSIONS_DIR_NAME),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn state_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }

    /// Directory for engine-mirrored session artifacts (transcript copy and
    /// other agent-native files included in shadow snapshots).
    pub fn metadata_dir(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.d"))
    }

    /// Persist `state`, atomically replacing any previous file.
    pub fn save(&self, state: &SessionState) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create sessions dir: {}", self.dir.display()))?;

        let path = self.state_path(&state.session_id);
        let tmp_path = self.dir.join(format!("{}.json.tmp", state.session_id));
        let contents =
            serde_json::to_vec_pretty(state).context("Failed to serialize session state")?;
        fs::write(&tmp_path, contents)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to move state into place: {}", path.display()))?;
        Ok(())
    }

    /// Load one session. Missing file is `SessionNotFound`; unparseable
    /// JSON is `StateCorruption` so the caller can decide whether to skip.
    pub fn load(&self, session_id: &str) -> Result<SessionState, EngineError> {
        let path = self.state_path(session_id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(EngineError::SessionNotFound(session_id.to_string()));
            }
            Err(err) => {
                return Err(EngineError::StateCorruption {
                    session_id: session_id.to_string(),
                    reason: err.to_string(),
                });
            }
        };
        let state: SessionState =
            serde_json::from_str(&contents).map_err(|err| EngineError::StateCorruption {
                session_id: session_id.to_string(),
                reason: err.to_string(),
            })?;
        if !state.extra.is_empty() {
            let keys: Vec<&str> = state.extra.keys().map(String::as_str).collect();
            tracing::warn!(
                session_id,
                keys = ?keys,
                "Ignoring unknown session state keys"
            );
        }
        Ok(state)
    }

    /// All readable sessions. `.tmp` siblings are skipped; corrupted files
    /// are logged and skipped (the post-commit path must not die on one bad
    /// session).
    pub fn list(&self) -> Result<Vec<SessionState>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to list sessions in {}", self.dir.display()));
            }
        };

        let mut sessions = Vec::new();
        for entry in entries {
            let entry = entry.context("Failed to read sessions dir entry")?;
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(session_id) = name.strip_suffix(".json") else {
                continue;
            };
            match self.load(session_id) {
                Ok(state) => sessions.push(state),
                Err(err) => {
                    tracing::warn!(session_id, error = %err, "Skipping unreadable session");
                }
            }
        }
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(sessions)
    }

    /// Remove a session's state file. Missing files are fine.
    pub fn delete(&self, session_id: &str) -> Result<()> {
        let path = self.state_path(session_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to delete {}", path.display()))
            }
        }
    }

    /// Legacy lookup: early session files were named
    /// `YYYY-MM-DD-<agent_id>.json`. Scan for a stem ending in the agent ID.
    pub fn find_by_agent_suffix(&self, agent_id: &str) -> Result<Option<SessionState>> {
        let suffix = format!("-{agent_id}");
        for state in self.list()? {
            if state.session_id == agent_id || state.session_id.ends_with(&suffix) {
                return Ok(Some(state));
            }
        }
        Ok(None)
    }
}
