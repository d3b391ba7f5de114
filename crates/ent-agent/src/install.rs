//! Git hook installation.
//!
//! `entire init` drops `post-commit` and `prepare-commit-msg` shims into the
//! repository's hooks directory. Each shim line is guarded by a marker
//! comment so reinstalling is a no-op and user-authored hooks survive.

use anyhow::{Context, Result};
use ent_git::Repo;
use std::fs;
use std::path::PathBuf;

/// Marker identifying engine-managed lines inside a hook script.
pub const HOOK_MARKER: &str = "# entire-checkpoints";

const GIT_HOOKS: &[(&str, &str)] = &[
    ("post-commit", "entire git-hook post-commit || true"),
    (
        "prepare-commit-msg",
        "entire git-hook prepare-commit-msg \"$1\" || true",
    ),
];

fn hooks_dir(repo: &Repo) -> PathBuf {
    repo.common_dir().join("hooks")
}

/// Install the git hook shims. Returns `true` when anything was written;
/// running twice in a row returns `false` the second time.
pub fn install_git_hooks(repo: &Repo) -> Result<bool> {
    let dir = hooks_dir(repo);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create hooks dir: {}", dir.display()))?;

    let mut changed = false;
    for (hook_name, command) in GIT_HOOKS {
        let path = dir.join(hook_name);
        let line = format!("{HOOK_MARKER}\n{command}\n");

        match fs::read_to_string(&path) {
            Ok(existing) if existing.contains(HOOK_MARKER) => continue,
            Ok(existing) => {
                // Preserve the user's hook; append our guarded line.
                let mut updated = existing;
                if !updated.ends_with('\n') {
                    updated.push('\n');
                }
                updated.push_str(&line);
                fs::write(&path, updated)
                    .with_context(|| format!("Failed to update hook {}", path.display()))?;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                fs::write(&path, format!("#!/bin/sh\n{line}"))
                    .with_context(|| format!("Failed to write hook {}", path.display()))?;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read {}", path.display()));
            }
        }
        make_executable(&path)?;
        changed = true;
    }
    Ok(changed)
}

/// Whether both shims are present.
pub fn git_hooks_installed(repo: &Repo) -> bool {
    let dir = hooks_dir(repo);
    GIT_HOOKS.iter().all(|(hook_name, _)| {
        fs::read_to_string(dir.join(hook_name))
            .map(|contents| contents.contains(HOOK_MARKER))
            .unwrap_or(false)
    })
}

fn make_executable(path: &std::path::Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(perms.mode() | 0o755);
        fs::set_permissions(path, perms)
            .with_context(|| format!("Failed to chmod {}", path.display()))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
