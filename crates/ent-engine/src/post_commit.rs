//! Post-commit classification and carry-forward.

use crate::apply::{ActionHandler, apply_transition};
use crate::engine::Engine;
use crate::trailer;
use anyhow::{Context, Result};
use ent_core::machine::TransitionContext;
use ent_core::{CheckpointId, EventKind, HookEvent, Phase, files};
use ent_git::{TreeBuilder, shadow_branch_name};
use ent_session::{SessionState, transcript};
use std::path::Path;

/// Bound on carry-forward shadow creation retries when a sibling session
/// races on the same anchor.
const CARRY_RETRIES: u32 = 3;

impl Engine<'_> {
    /// React to a user commit landing at HEAD.
    ///
    /// Enumerates every stored session and runs the GitCommit transition
    /// for each. Never fails the caller's commit: per-session errors are
    /// logged and the loop continues.
    pub fn post_commit(&self) -> Result<()> {
        if self.repo.rebase_in_progress() {
            tracing::debug!("Rebase in progress; leaving every session untouched");
            return Ok(());
        }
        let Some(head) = self.repo.head_commit()? else {
            return Ok(());
        };
        let changed = self
            .repo
            .files_changed_in_commit(&head)
            .context("Failed to diff the new commit")?;

        for mut state in self.store.list()? {
            if let Err(err) = self.post_commit_session(&mut state, &head, &changed) {
                tracing::warn!(
                    session_id = %state.session_id,
                    error = %err,
                    "Post-commit handling failed for session; continuing"
                );
            }
        }
        Ok(())
    }

    fn post_commit_session(
        &self,
        state: &mut SessionState,
        head: &str,
        changed: &[String],
    ) -> Result<()> {
        let ctx = TransitionContext {
            rebase_in_progress: false,
            has_files_touched: state.has_files_touched(),
        };
        let event = HookEvent::new(EventKind::GitCommit, state.session_id.clone());
        let mut handler = CommitHandler {
            engine: self,
            head,
            changed,
        };
        let result = apply_transition(state, &event, &ctx, &mut handler);
        self.store.save(state)?;
        result.map(|_| ())
    }

    /// Re-anchor an ACTIVE session after a partial commit: fresh shadow
    /// branch at `head` snapshotting the worktree contents of every path
    /// the commit did not include.
    fn carry_forward(
        &self,
        state: &mut SessionState,
        head: &str,
        remaining: Vec<String>,
    ) -> Result<()> {
        state.files_touched.clear();
        state.step_count = 0;
        state.last_checkpoint_id = None;
        if remaining.is_empty() {
            return Ok(());
        }

        let suffix = self.repo.shadow_suffix();
        let shadow = shadow_branch_name(head, suffix.as_deref());
        let lines = transcript::line_count(Path::new(&state.transcript_path))?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let (parent, expected_old) = match self.repo.resolve_branch(&shadow)? {
                Some(tip) => (tip.clone(), Some(tip)),
                None => (head.to_string(), None),
            };

            let parent_tree = self.repo.tree_of(&parent)?;
            let builder = TreeBuilder::from_tree(self.repo, Some(&parent_tree))?;
            for rel_path in &remaining {
                if self.repo.workdir().join(rel_path).exists() {
                    builder.add_worktree_file(rel_path)?;
                } else {
                    builder.remove(rel_path)?;
                }
            }
            let tree = builder.write()?;

            let id = CheckpointId::derive(&tree, &state.session_id);
            let message = format!(
                "carry-forward snapshot\n\n{}: {}\n{}: {}\n",
                trailer::ID_TRAILER_KEY,
                id,
                trailer::TRANSCRIPT_TRAILER_KEY,
                lines,
            );
            let commit = self
                .repo
                .commit_tree(&tree, &[parent.as_str()], &message, &self.sig)?;
            if self
                .repo
                .update_branch_cas(&shadow, &commit, expected_old.as_deref())?
            {
                break;
            }
            if attempt >= CARRY_RETRIES {
                anyhow::bail!("carry-forward lost the race for '{shadow}' {attempt} times");
            }
        }

        state.files_touched = remaining;
        state.step_count = 1;
        // The next condensation reprocesses the transcript from the turn
        // boundary.
        state.checkpoint_transcript_start = 0;
        Ok(())
    }
}

/// GitCommit action handlers: the classification half of the decision tree
/// lives here, phase by phase.
struct CommitHandler<'e, 'r> {
    engine: &'e Engine<'r>,
    head: &'e str,
    changed: &'e [String],
}

impl CommitHandler<'_, '_> {
    fn overlaps(&self, state: &SessionState) -> bool {
        files::overlap(&state.files_touched, self.changed)
    }
}

impl ActionHandler for CommitHandler<'_, '_> {
    fn condense(&mut self, state: &mut SessionState) -> Result<()> {
        match state.phase {
            Phase::Active => {
                // Remember what this turn produced before anything resets.
                if let Some(id) = state.last_checkpoint_id.clone() {
                    if !state.turn_checkpoint_ids.contains(&id) {
                        state.turn_checkpoint_ids.push(id);
                    }
                }

                if self.overlaps(state) {
                    let touched_before = state.files_touched.clone();
                    self.engine.condense_session(state)?;
                    let remaining = files::subtract(&touched_before, self.changed);
                    self.engine.carry_forward(state, self.head, remaining)?;
                    state.base_commit = self.head.to_string();
                } else {
                    // Stale session or unrelated commit: follow HEAD so the
                    // next turn anchors correctly, condense nothing.
                    state.base_commit = self.head.to_string();
                }
            }
            Phase::Idle => {
                // The base commit of an idle session must not move; doing
                // so would enrol it for condensation into the next
                // unrelated commit.
                if self.engine.session_has_new_content(state)? && self.overlaps(state) {
                    self.engine.condense_session(state)?;
                }
            }
            Phase::Ended => {}
        }
        Ok(())
    }

    fn condense_if_files_touched(&mut self, state: &mut SessionState) -> Result<()> {
        // ENDED with touched files; base commit stays put either way.
        if self.engine.session_has_new_content(state)? && self.overlaps(state) {
            self.engine.condense_session(state)?;
        }
        Ok(())
    }

    fn discard_if_no_files(&mut self, state: &mut SessionState) -> Result<()> {
        self.engine.discard_shadow(state)
    }
}
