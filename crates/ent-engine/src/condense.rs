//! Condensation: shadow branch → metadata branch.

use crate::engine::Engine;
use crate::save_step::SESSION_MIRROR_PREFIX;
use crate::trailer;
use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use ent_core::{CheckpointId, EngineError};
use ent_git::{METADATA_BRANCH, TreeBuilder};
use ent_session::{SessionState, transcript};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bound on metadata-branch CAS retries before reporting a retryable
/// failure.
const CAS_RETRIES: u32 = 3;

pub(crate) const STATUS_CONDENSED: &str = "condensed";

/// `summary.json` inside a checkpoint's metadata directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub checkpoint_id: CheckpointId,
    pub session_id: String,
    /// The commit the session's shadow branch was anchored on.
    pub base_commit: String,
    /// The shadow snapshot commit, kept reachable through this record so
    /// rewind can restore file content after the branch is gone.
    pub snapshot_commit: String,
    pub files_touched: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub condensed_at: DateTime<Utc>,
    pub status: String,
}

struct CondensedEntry {
    summary: CheckpointSummary,
    transcript_slice: Vec<u8>,
    /// `(file name under session/, blob oid)` copied out of the snapshot's
    /// mirrored metadata subtree.
    artifacts: Vec<(String, String)>,
}

impl Engine<'_> {
    /// Condense every checkpoint on the session's shadow branch into the
    /// metadata branch.
    ///
    /// On success the shadow branch is deleted and the session's counters
    /// advance (`step_count` to zero, `files_touched` cleared, transcript
    /// cursor to the current line count). On any failure the branch and
    /// every state field stay exactly as they were.
    pub fn condense_session(
        &self,
        state: &mut SessionState,
    ) -> Result<Vec<CheckpointId>, EngineError> {
        let shadow = self.shadow_branch_for(state);
        let tip = match self.repo.resolve_branch(&shadow) {
            Ok(Some(tip)) => tip,
            Ok(None) if self.repo.branch_ref_present(&shadow) => {
                return Err(condense_failed(
                    format!("shadow branch '{shadow}' exists but does not resolve to a commit"),
                    false,
                ));
            }
            Ok(None) => {
                // Nothing on disk for this anchor. Sessions sharing a
                // shadow branch land here after a sibling consumed it;
                // their bookkeeping still advances.
                self.advance_after_condense(state)?;
                return Ok(Vec::new());
            }
            Err(err) => return Err(condense_failed(err, false)),
        };

        let entries = self
            .collect_entries(state, &tip)
            .map_err(|err| condense_failed(err, false))?;
        if entries.is_empty() {
            // Only the initial commit: success with nothing to record.
            self.delete_consumed_shadow(&shadow, &tip);
            self.advance_after_condense(state)?;
            return Ok(Vec::new());
        }

        let ids = self
            .write_metadata_commit(&entries)
            .map_err(|err| match err.downcast::<EngineError>() {
                Ok(engine_err) => engine_err,
                Err(other) => condense_failed(other, false),
            })?;

        self.delete_consumed_shadow(&shadow, &tip);
        self.advance_after_condense(state)?;
        tracing::info!(
            session_id = %state.session_id,
            checkpoints = ids.len(),
            "Condensed shadow branch"
        );
        Ok(ids)
    }

    /// Read every checkpoint commit between the shadow tip and the base
    /// commit, oldest first, pairing each with its transcript slice and
    /// mirrored artifacts.
    fn collect_entries(&self, state: &SessionState, tip: &str) -> Result<Vec<CondensedEntry>> {
        let mut commits = self
            .repo
            .rev_list(tip, Some(&state.base_commit))
            .context("Failed to walk shadow branch")?;
        commits.reverse();

        let transcript_path = Path::new(&state.transcript_path);
        let now = Utc::now();
        let mirror_prefix = format!("{SESSION_MIRROR_PREFIX}/{}/", state.session_id);

        let mut entries = Vec::with_capacity(commits.len());
        let mut prev_pos = state.checkpoint_transcript_start;
        for commit in &commits {
            let message = self.repo.commit_message(commit)?;
            let checkpoint_id = trailer::trailer_value(&message, trailer::ID_TRAILER_KEY)
                .and_then(|value| CheckpointId::parse(&value).ok())
                .unwrap_or_else(|| {
                    // Pre-trailer shadow commits: recompute from content.
                    let tree = self.repo.tree_of(commit).unwrap_or_else(|_| commit.clone());
                    CheckpointId::derive(&tree, &state.session_id)
                });
            let pos = trailer::trailer_value(&message, trailer::TRANSCRIPT_TRAILER_KEY)
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(prev_pos)
                .max(prev_pos);
            let transcript_slice = transcript::slice_lines(transcript_path, prev_pos, pos)?;

            let files_touched: Vec<String> = self
                .repo
                .files_changed_in_commit(commit)?
                .into_iter()
                .filter(|path| !path.starts_with(".entire/"))
                .collect();

            let artifacts: Vec<(String, String)> = self
                .repo
                .ls_tree(commit)?
                .into_iter()
                .filter_map(|entry| {
                    let name = entry.path.strip_prefix(&mirror_prefix)?;
                    Some((name.to_string(), entry.oid))
                })
                .collect();

            let created_at = Utc
                .timestamp_opt(self.repo.commit_time(commit)?, 0)
                .single()
                .unwrap_or(now);

            entries.push(CondensedEntry {
                summary: CheckpointSummary {
                    checkpoint_id,
                    session_id: state.session_id.clone(),
                    base_commit: state.base_commit.clone(),
                    snapshot_commit: commit.clone(),
                    files_touched,
                    created_at,
                    condensed_at: now,
                    status: STATUS_CONDENSED.to_string(),
                },
                transcript_slice,
                artifacts,
            });
            prev_pos = pos;
        }
        Ok(entries)
    }

    /// Read-modify-write one consolidated commit onto the metadata branch,
    /// retrying when the reference moves between read and update.
    fn write_metadata_commit(&self, entries: &[CondensedEntry]) -> Result<Vec<CheckpointId>> {
        for _ in 0..CAS_RETRIES {
            let old_tip = self.repo.resolve_branch(METADATA_BRANCH)?;
            let old_tree = match &old_tip {
                Some(tip) => Some(self.repo.tree_of(tip)?),
                None => None,
            };

            let builder = TreeBuilder::from_tree(self.repo, old_tree.as_deref())?;
            for entry in entries {
                let dir = entry.summary.checkpoint_id.dir_path();
                // Same ID reappearing replaces its directory wholesale.
                builder.remove_prefix(&dir)?;

                let summary_json = serde_json::to_vec_pretty(&entry.summary)
                    .context("Failed to serialize checkpoint summary")?;
                let summary_oid = self.repo.write_blob(&summary_json)?;
                builder.add(&format!("{dir}/summary.json"), &summary_oid, "100644")?;

                let transcript_oid = self.repo.write_blob(&entry.transcript_slice)?;
                builder.add(&format!("{dir}/transcript.jsonl"), &transcript_oid, "100644")?;

                for (name, oid) in &entry.artifacts {
                    builder.add(&format!("{dir}/session/{name}"), oid, "100644")?;
                }
            }
            let tree = builder.write()?;

            let message = format!("condense {} checkpoint(s)\n", entries.len());
            let parents: Vec<&str> = old_tip.iter().map(String::as_str).collect();
            let commit = self.repo.commit_tree(&tree, &parents, &message, &self.sig)?;

            if self
                .repo
                .update_branch_cas(METADATA_BRANCH, &commit, old_tip.as_deref())?
            {
                return Ok(entries
                    .iter()
                    .map(|entry| entry.summary.checkpoint_id.clone())
                    .collect());
            }
            tracing::debug!("Metadata branch moved during condense; retrying");
        }
        Err(EngineError::CondenseFailed {
            reason: format!("metadata branch kept moving across {CAS_RETRIES} attempts"),
            retryable: true,
        }
        .into())
    }

    /// Best-effort deletion of a consumed shadow branch. A concurrent
    /// snapshot may have advanced it; then it stays and the new steps get
    /// condensed next time.
    fn delete_consumed_shadow(&self, shadow: &str, tip: &str) {
        match self.repo.delete_branch(shadow, Some(tip)) {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(branch = %shadow, "Shadow branch moved since condense; keeping it");
            }
            Err(err) => {
                tracing::warn!(branch = %shadow, error = %err, "Failed to delete shadow branch");
            }
        }
    }

    /// Bookkeeping after content reached the metadata branch.
    fn advance_after_condense(&self, state: &mut SessionState) -> Result<(), EngineError> {
        let lines = transcript::line_count(Path::new(&state.transcript_path))
            .map_err(|err| condense_failed(err, false))?;
        state.checkpoint_transcript_start = state.checkpoint_transcript_start.max(lines);
        state.step_count = 0;
        state.files_touched.clear();
        Ok(())
    }

    /// Every checkpoint recorded on the metadata branch, newest first.
    pub fn list_checkpoints(&self) -> Result<Vec<CheckpointSummary>> {
        let Some(tip) = self.repo.resolve_branch(METADATA_BRANCH)? else {
            return Ok(Vec::new());
        };
        let mut summaries = Vec::new();
        for entry in self.repo.ls_tree(&tip)? {
            if !entry.path.ends_with("/summary.json") {
                continue;
            }
            let bytes = self.repo.read_blob(&entry.oid)?;
            match serde_json::from_slice::<CheckpointSummary>(&bytes) {
                Ok(summary) => summaries.push(summary),
                Err(err) => {
                    tracing::warn!(path = %entry.path, error = %err, "Skipping unreadable summary");
                }
            }
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }
}

fn condense_failed(err: impl std::fmt::Display, retryable: bool) -> EngineError {
    EngineError::CondenseFailed {
        reason: err.to_string(),
        retryable,
    }
}
