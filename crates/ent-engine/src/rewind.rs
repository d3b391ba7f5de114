//! Worktree rewind to a recorded checkpoint.

use crate::engine::Engine;
use anyhow::{Context, Result};
use ent_core::{CheckpointId, EngineError};
use std::collections::HashSet;
use std::fs;

/// What a rewind did (or, for a preview, would do).
#[derive(Debug, Clone, Default)]
pub struct RewindReport {
    /// Files whose content was restored from the snapshot.
    pub restored: Vec<String>,
    /// Untracked files created after the checkpoint that were deleted.
    pub deleted: Vec<String>,
}

impl Engine<'_> {
    /// Restore the working tree to the state a checkpoint recorded.
    ///
    /// Every file in the snapshot is written back. Files created *after*
    /// the checkpoint — per the session's later checkpoint records and its
    /// live state — are deleted, with the full list logged as a warning
    /// before the first deletion. Anything else, in particular untracked
    /// files that predate the session, is left alone.
    pub fn rewind(&self, id: &CheckpointId) -> Result<RewindReport> {
        let summaries = self.list_checkpoints()?;
        let summary = summaries
            .iter()
            .find(|s| s.checkpoint_id == *id)
            .ok_or_else(|| EngineError::CheckpointNotFound(id.to_string()))?;

        let snapshot_entries: Vec<_> = self
            .repo
            .ls_tree(&summary.snapshot_commit)
            .with_context(|| {
                format!(
                    "Snapshot {} is unreachable (garbage collected?)",
                    summary.snapshot_commit
                )
            })?
            .into_iter()
            .filter(|entry| !entry.path.starts_with(".entire/"))
            .collect();
        let snapshot_paths: HashSet<&str> =
            snapshot_entries.iter().map(|e| e.path.as_str()).collect();

        // Paths this session touched after the checkpoint being restored.
        let mut created_after: Vec<String> = Vec::new();
        for later in summaries
            .iter()
            .filter(|s| s.session_id == summary.session_id && s.created_at > summary.created_at)
        {
            for path in &later.files_touched {
                if !created_after.contains(path) {
                    created_after.push(path.clone());
                }
            }
        }
        if let Ok(state) = self.store.load(&summary.session_id) {
            for path in &state.files_touched {
                if !created_after.contains(path) {
                    created_after.push(path.clone());
                }
            }
        }

        let to_delete: Vec<String> = created_after
            .into_iter()
            .filter(|path| {
                !snapshot_paths.contains(path.as_str())
                    && self.repo.workdir().join(path).is_file()
            })
            .collect();

        // Preview before touching anything.
        if !to_delete.is_empty() {
            tracing::warn!(
                checkpoint = %id,
                files = ?to_delete,
                "Rewind will delete files created after this checkpoint"
            );
        }

        let mut report = RewindReport::default();
        for entry in &snapshot_entries {
            let bytes = self.repo.read_blob(&entry.oid)?;
            let target = self.repo.workdir().join(&entry.path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&target, &bytes)
                .with_context(|| format!("Failed to restore {}", target.display()))?;
            set_mode(&target, &entry.mode)?;
            report.restored.push(entry.path.clone());
        }

        for path in &to_delete {
            let target = self.repo.workdir().join(path);
            fs::remove_file(&target)
                .with_context(|| format!("Failed to delete {}", target.display()))?;
            report.deleted.push(path.clone());
        }

        tracing::info!(
            checkpoint = %id,
            restored = report.restored.len(),
            deleted = report.deleted.len(),
            "Rewound working tree"
        );
        Ok(report)
    }
}

fn set_mode(path: &std::path::Path, git_mode: &str) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if git_mode == "100755" {
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(perms.mode() | 0o111);
            fs::set_permissions(path, perms)
                .with_context(|| format!("Failed to chmod {}", path.display()))?;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (path, git_mode);
    }
    Ok(())
}
