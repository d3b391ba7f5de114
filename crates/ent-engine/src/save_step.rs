//! Shadow branch snapshots.

use crate::engine::Engine;
use anyhow::{Context, Result, anyhow, bail};
use ent_core::{CheckpointId, EngineError, Phase, files};
use ent_git::TreeBuilder;
use ent_session::{SessionState, transcript};
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix inside shadow trees where session metadata is mirrored.
pub(crate) const SESSION_MIRROR_PREFIX: &str = ".entire/sessions";

/// How often a snapshot retries when the shadow branch tip moves under it.
const SAVE_RETRIES: u32 = 3;

/// One snapshot request.
#[derive(Debug, Clone, Default)]
pub struct SaveStepInput {
    pub session_id: String,
    /// Tracked files with new content.
    pub modified: Vec<String>,
    /// Files the agent created that are not tracked yet.
    pub new: Vec<String>,
    /// Files the agent removed.
    pub deleted: Vec<String>,
    /// Directory whose contents are mirrored verbatim into the snapshot.
    pub metadata_dir: Option<PathBuf>,
    /// Commit subject for the shadow commit.
    pub subject: String,
}

impl Engine<'_> {
    /// Record one checkpoint on the session's shadow branch.
    ///
    /// Loads (or creates) the session state, snapshots, and saves. Returns
    /// the new checkpoint ID, or `None` when the snapshot would be
    /// identical to the shadow tip.
    pub fn save_step(&self, input: &SaveStepInput) -> Result<Option<CheckpointId>> {
        let mut state = match self.store.load(&input.session_id) {
            Ok(state) => state,
            Err(EngineError::SessionNotFound(_)) => {
                let head = self
                    .repo
                    .head_commit()?
                    .context("Cannot checkpoint in a repository with no commits")?;
                SessionState::new(
                    &input.session_id,
                    self.repo.worktree_id(),
                    self.repo.workdir().to_string_lossy(),
                    head,
                    "",
                )
            }
            Err(err) => return Err(err.into()),
        };
        let id = self.save_step_with_state(&mut state, input)?;
        self.store.save(&state)?;
        Ok(id)
    }

    /// Snapshot against an already-loaded state. The caller saves.
    pub(crate) fn save_step_with_state(
        &self,
        state: &mut SessionState,
        input: &SaveStepInput,
    ) -> Result<Option<CheckpointId>> {
        let shadow = self.shadow_branch_for(state);

        let mut attempt = 0;
        let id = loop {
            attempt += 1;
            let tip = self.ensure_shadow_branch(&shadow, &state.base_commit)?;
            match self.try_snapshot(state, input, &shadow, &tip)? {
                SnapshotAttempt::Done(id) => break id,
                SnapshotAttempt::Unchanged => return Ok(None),
                SnapshotAttempt::TipMoved if attempt < SAVE_RETRIES => continue,
                SnapshotAttempt::TipMoved => {
                    bail!("shadow branch '{shadow}' kept moving; giving up after {attempt} attempts")
                }
            }
        };

        state.step_count += 1;
        let added: Vec<String> = input
            .modified
            .iter()
            .chain(&input.new)
            .cloned()
            .collect();
        files::merge_touched(&mut state.files_touched, &added, &input.deleted);
        state.last_checkpoint_id = Some(id.clone());
        if state.phase == Phase::Active && !state.turn_checkpoint_ids.contains(&id) {
            state.turn_checkpoint_ids.push(id.clone());
        }
        Ok(Some(id))
    }

    /// Resolve the shadow branch tip, creating the branch at the base
    /// commit on first use.
    fn ensure_shadow_branch(&self, shadow: &str, base_commit: &str) -> Result<String> {
        if let Some(tip) = self.repo.resolve_branch(shadow)? {
            return Ok(tip);
        }
        if self.repo.update_branch_cas(shadow, base_commit, None)? {
            return Ok(base_commit.to_string());
        }
        // Lost the creation race; whoever won left a tip for us.
        self.repo
            .resolve_branch(shadow)?
            .ok_or_else(|| anyhow!("shadow branch '{shadow}' vanished during creation"))
    }

    fn try_snapshot(
        &self,
        state: &SessionState,
        input: &SaveStepInput,
        shadow: &str,
        tip: &str,
    ) -> Result<SnapshotAttempt> {
        let tip_tree = self.repo.tree_of(tip)?;
        let builder = TreeBuilder::from_tree(self.repo, Some(&tip_tree))?;

        for rel_path in input.modified.iter().chain(&input.new) {
            if self.repo.workdir().join(rel_path).exists() {
                builder.add_worktree_file(rel_path)?;
            }
        }
        for rel_path in &input.deleted {
            builder.remove(rel_path)?;
        }
        if let Some(dir) = &input.metadata_dir {
            let prefix = format!("{SESSION_MIRROR_PREFIX}/{}", input.session_id);
            self.mirror_into_tree(&builder, dir, &prefix)?;
        }

        let tree = builder.write()?;
        if tree == tip_tree {
            return Ok(SnapshotAttempt::Unchanged);
        }

        let id = CheckpointId::derive(&tree, &input.session_id);
        let lines = transcript::line_count(Path::new(&state.transcript_path))?;
        let message = format!(
            "{}\n\n{}: {}\n{}: {}\n",
            if input.subject.is_empty() {
                format!("checkpoint {id}")
            } else {
                input.subject.clone()
            },
            crate::trailer::ID_TRAILER_KEY,
            id,
            crate::trailer::TRANSCRIPT_TRAILER_KEY,
            lines,
        );

        let commit = self
            .repo
            .commit_tree(&tree, &[tip], &message, &self.sig)
            .map_err(|err| EngineError::GitObjectWrite(err.to_string()))?;
        if self.repo.update_branch_cas(shadow, &commit, Some(tip))? {
            Ok(SnapshotAttempt::Done(id))
        } else {
            Ok(SnapshotAttempt::TipMoved)
        }
    }

    /// Add every file under `dir` to the tree at `prefix/<relative path>`.
    fn mirror_into_tree(&self, builder: &TreeBuilder, dir: &Path, prefix: &str) -> Result<()> {
        if !dir.exists() {
            return Ok(());
        }
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            for entry in fs::read_dir(&current)
                .with_context(|| format!("Failed to read {}", current.display()))?
            {
                let entry = entry?;
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                let rel = path
                    .strip_prefix(dir)
                    .expect("walked path is under its root")
                    .to_string_lossy()
                    .to_string();
                let bytes = fs::read(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let oid = self.repo.write_blob(&bytes)?;
                builder.add(&format!("{prefix}/{rel}"), &oid, "100644")?;
            }
        }
        Ok(())
    }
}

enum SnapshotAttempt {
    Done(CheckpointId),
    Unchanged,
    TipMoved,
}
