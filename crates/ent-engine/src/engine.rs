//! Engine handle and lifecycle event handling.

use crate::apply::{NoCommitHandler, apply_transition};
use crate::save_step::SaveStepInput;
use crate::trailer;
use anyhow::{Context, Result};
use ent_agent::Agent;
use ent_core::machine::TransitionContext;
use ent_core::{EngineError, EventKind, HookEvent};
use ent_git::{Repo, Signature, shadow_branch_name, worktree_suffix};
use ent_session::{SessionState, SessionStore, transcript};
use std::fs;
use std::path::Path;

/// The engine: a repository handle, the session store living in its git
/// common dir, and the identity used for engine-created commits.
///
/// Constructed once per process and passed wherever checkpoint work
/// happens; nothing in here is a global.
pub struct Engine<'r> {
    pub(crate) repo: &'r Repo,
    pub(crate) store: SessionStore,
    pub(crate) sig: Signature,
}

impl<'r> Engine<'r> {
    pub fn new(repo: &'r Repo) -> Self {
        let mut sig = Signature::default();
        // ENTIRE_TEST_* variables exist for the test suite only.
        if let Ok(name) = std::env::var("ENTIRE_TEST_AUTHOR_NAME") {
            sig.name = name;
        }
        if let Ok(email) = std::env::var("ENTIRE_TEST_AUTHOR_EMAIL") {
            sig.email = email;
        }
        Self {
            repo,
            store: SessionStore::open(repo.common_dir()),
            sig,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn repo(&self) -> &Repo {
        self.repo
    }

    /// Handle one normalized agent event.
    ///
    /// This is the hook entry point for everything except git commits,
    /// which arrive through [`Engine::post_commit`].
    pub fn handle_event(&self, agent: &dyn Agent, event: &HookEvent) -> Result<()> {
        if event.kind == EventKind::GitCommit {
            return self.post_commit();
        }

        let mut state = self.load_or_create(event)?;

        // A turn that just finished gets its file modifications snapshotted
        // onto the shadow branch before the phase moves. Best-effort: a
        // failed snapshot must not lose the phase transition.
        if event.kind == EventKind::TurnEnd {
            if let Err(err) = self.snapshot_turn(agent, &mut state) {
                tracing::warn!(
                    session_id = %state.session_id,
                    error = %err,
                    "Failed to snapshot turn changes"
                );
            }
        }
        if event.kind == EventKind::SessionStop {
            state.ended_at = Some(event.effective_time());
        }

        let ctx = TransitionContext {
            rebase_in_progress: self.repo.rebase_in_progress(),
            has_files_touched: state.has_files_touched(),
        };
        let result = apply_transition(&mut state, event, &ctx, &mut NoCommitHandler);

        if event.kind == EventKind::TurnEnd {
            self.finalize_turn(&mut state);
        }

        self.store.save(&state)?;
        result.map(|_| ())
    }

    /// Load the session, or create one pinned to the current HEAD and
    /// worktree when this is the first event we see for it.
    pub(crate) fn load_or_create(&self, event: &HookEvent) -> Result<SessionState> {
        match self.store.load(&event.session_id) {
            Ok(mut state) => {
                // Transcripts move when the agent resumes a conversation.
                if let Some(session_ref) = &event.session_ref {
                    if state.transcript_path != *session_ref {
                        state.transcript_path = session_ref.clone();
                    }
                }
                Ok(state)
            }
            Err(EngineError::SessionNotFound(_)) => {
                let head = self
                    .repo
                    .head_commit()?
                    .context("Cannot start a session in a repository with no commits")?;
                Ok(SessionState::new(
                    &event.session_id,
                    self.repo.worktree_id(),
                    self.repo.workdir().to_string_lossy(),
                    head,
                    event.session_ref.clone().unwrap_or_default(),
                ))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Shadow branch name for a session's `(base_commit, worktree)` anchor.
    pub(crate) fn shadow_branch_for(&self, state: &SessionState) -> String {
        let suffix = if self.repo.is_primary_worktree() && state.worktree_id == self.repo.worktree_id()
        {
            None
        } else {
            Some(worktree_suffix(&state.worktree_id))
        };
        shadow_branch_name(&state.base_commit, suffix.as_deref())
    }

    /// A session has new content when its transcript grew past the condense
    /// cursor, or its shadow branch moved past the base commit.
    pub(crate) fn session_has_new_content(&self, state: &SessionState) -> Result<bool> {
        let lines = transcript::line_count(Path::new(&state.transcript_path))?;
        if lines > state.checkpoint_transcript_start {
            return Ok(true);
        }
        let shadow = self.shadow_branch_for(state);
        match self.repo.resolve_branch(&shadow)? {
            Some(tip) => Ok(tip != state.base_commit),
            None => Ok(false),
        }
    }

    /// Delete a session's shadow branch, if any.
    pub(crate) fn discard_shadow(&self, state: &SessionState) -> Result<()> {
        let shadow = self.shadow_branch_for(state);
        if let Some(tip) = self.repo.resolve_branch(&shadow)? {
            if self.repo.delete_branch(&shadow, Some(&tip))? {
                tracing::info!(
                    session_id = %state.session_id,
                    branch = %shadow,
                    "Discarded shadow branch with nothing to condense"
                );
            }
        }
        Ok(())
    }

    /// Snapshot the files this turn modified onto the shadow branch.
    fn snapshot_turn(&self, agent: &dyn Agent, state: &mut SessionState) -> Result<()> {
        let transcript_path = Path::new(&state.transcript_path);
        let slice =
            transcript::slice_from_line(transcript_path, state.checkpoint_transcript_start)?;
        let raw_paths = agent.extract_modified_files(&slice);
        let (modified, new, deleted) = self.classify_paths(&raw_paths)?;
        if modified.is_empty() && new.is_empty() && deleted.is_empty() {
            return Ok(());
        }

        let usage = agent.token_usage(&slice);
        tracing::debug!(
            session_id = %state.session_id,
            prompts = agent.extract_prompts(&slice).len(),
            summary = agent.extract_summary(&slice).as_deref().unwrap_or(""),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Turn produced file changes"
        );

        self.mirror_session_data(agent, state, &slice)?;
        let input = SaveStepInput {
            session_id: state.session_id.clone(),
            modified,
            new,
            deleted,
            metadata_dir: Some(self.store.metadata_dir(&state.session_id)),
            subject: "turn snapshot".to_string(),
        };
        self.save_step_with_state(state, &input)?;
        Ok(())
    }

    /// Split agent-reported paths into modified / new / deleted relative to
    /// the worktree. Paths outside the worktree and engine-owned paths are
    /// dropped.
    pub(crate) fn classify_paths(
        &self,
        raw_paths: &[String],
    ) -> Result<(Vec<String>, Vec<String>, Vec<String>)> {
        let mut modified = Vec::new();
        let mut new = Vec::new();
        let mut deleted = Vec::new();
        for raw in raw_paths {
            let Some(rel) = self.relativize(raw) else {
                continue;
            };
            if rel.starts_with(".entire/") || rel == ".entire" {
                continue;
            }
            if self.repo.workdir().join(&rel).exists() {
                if self.repo.is_tracked(&rel)? {
                    modified.push(rel);
                } else {
                    new.push(rel);
                }
            } else {
                deleted.push(rel);
            }
        }
        Ok((modified, new, deleted))
    }

    fn relativize(&self, raw: &str) -> Option<String> {
        let path = Path::new(raw);
        let rel = if path.is_absolute() {
            match path.strip_prefix(self.repo.workdir()) {
                Ok(rel) => rel.to_path_buf(),
                // The agent may report a path through a symlinked root.
                Err(_) => {
                    let canonical = path.canonicalize().ok()?;
                    canonical
                        .strip_prefix(self.repo.workdir())
                        .ok()?
                        .to_path_buf()
                }
            }
        } else {
            path.to_path_buf()
        };
        let rel = rel.to_string_lossy().to_string();
        if rel.is_empty() { None } else { Some(rel) }
    }

    /// Refresh the session's metadata directory: the transcript copy plus
    /// the agent's chunked native session data. Shadow snapshots mirror
    /// this directory verbatim.
    fn mirror_session_data(
        &self,
        agent: &dyn Agent,
        state: &SessionState,
        slice: &[u8],
    ) -> Result<()> {
        let dir = self.store.metadata_dir(&state.session_id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let source = Path::new(&state.transcript_path);
        if source.exists() {
            fs::copy(source, dir.join("transcript.jsonl"))
                .with_context(|| format!("Failed to mirror transcript for {}", state.session_id))?;
        }
        for (name, bytes) in agent.chunk_session_artifacts(slice) {
            fs::write(dir.join(&name), bytes)
                .with_context(|| format!("Failed to write session chunk {name}"))?;
        }
        Ok(())
    }

    /// A turn is over: whatever IDs it accumulated are drained, even when
    /// earlier finalization steps failed, so they cannot leak into the next
    /// turn.
    fn finalize_turn(&self, state: &mut SessionState) {
        if state.turn_checkpoint_ids.is_empty() {
            return;
        }
        let drained: Vec<_> = state.turn_checkpoint_ids.drain(..).collect();
        tracing::debug!(
            session_id = %state.session_id,
            checkpoints = drained.len(),
            "Turn finished"
        );
    }

    /// prepare-commit-msg hook: tie the upcoming commit to the most recent
    /// checkpoint by inserting the trailer.
    pub fn prepare_commit_msg(&self, message_file: &Path) -> Result<()> {
        if self.repo.rebase_in_progress() {
            return Ok(());
        }
        let mut candidates: Vec<SessionState> = self
            .store
            .list()?
            .into_iter()
            .filter(|s| s.last_checkpoint_id.is_some())
            .collect();
        candidates.sort_by_key(|s| std::cmp::Reverse(s.last_interaction_time));

        let mut chosen = None;
        for candidate in &candidates {
            if self.session_has_new_content(candidate)? {
                chosen = candidate.last_checkpoint_id.clone();
                break;
            }
        }
        let Some(id) = chosen else {
            return Ok(());
        };

        let message = fs::read_to_string(message_file)
            .with_context(|| format!("Failed to read {}", message_file.display()))?;
        let updated = trailer::insert_checkpoint_trailer(&message, &id);
        if updated != message {
            fs::write(message_file, updated)
                .with_context(|| format!("Failed to write {}", message_file.display()))?;
        }
        Ok(())
    }
}
