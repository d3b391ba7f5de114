//! Repository discovery and process plumbing.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Handle to a discovered repository.
///
/// The worktree root, per-worktree git dir, and common dir are resolved once
/// at discovery and cached on the handle for the lifetime of the process.
/// Tests that mutate the repository layout get a fresh view by calling
/// [`Repo::discover`] again instead of clearing hidden global state.
#[derive(Debug, Clone)]
pub struct Repo {
    workdir: PathBuf,
    git_dir: PathBuf,
    common_dir: PathBuf,
}

impl Repo {
    /// Discover the repository containing `path`.
    pub fn discover(path: &Path) -> Result<Self> {
        let workdir = PathBuf::from(git_in(path, &["rev-parse", "--show-toplevel"])?);
        let git_dir = PathBuf::from(git_in(path, &["rev-parse", "--absolute-git-dir"])?);
        let git_dir = git_dir.canonicalize().unwrap_or(git_dir);

        // --git-common-dir may print a path relative to the command's cwd.
        let common_raw = PathBuf::from(git_in(path, &["rev-parse", "--git-common-dir"])?);
        let common_dir = if common_raw.is_absolute() {
            common_raw
        } else {
            path.join(common_raw)
        };
        let common_dir = common_dir
            .canonicalize()
            .with_context(|| format!("Failed to resolve git common dir: {}", common_dir.display()))?;

        Ok(Self {
            workdir,
            git_dir,
            common_dir,
        })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// The git common dir, shared by all worktrees of this repository.
    pub fn common_dir(&self) -> &Path {
        &self.common_dir
    }

    /// Whether this handle points at the primary worktree.
    pub fn is_primary_worktree(&self) -> bool {
        self.git_dir == self.common_dir
    }

    /// Identifier for this working tree: its canonical root path.
    pub fn worktree_id(&self) -> String {
        self.workdir.to_string_lossy().to_string()
    }

    /// The current HEAD commit, or `None` on an unborn branch.
    pub fn head_commit(&self) -> Result<Option<String>> {
        self.run_optional(&["rev-parse", "--verify", "--quiet", "HEAD^{commit}"])
    }

    /// A history-rewriting operation is underway when the per-worktree git
    /// dir contains a rebase state directory.
    pub fn rebase_in_progress(&self) -> bool {
        self.git_dir.join("rebase-merge").exists() || self.git_dir.join("rebase-apply").exists()
    }

    /// Run git in the worktree, returning trimmed stdout.
    pub(crate) fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.command(args).output().context("Failed to run git")?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.first().copied().unwrap_or(""),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run git, returning raw stdout bytes (blob content is not UTF-8).
    pub(crate) fn run_bytes(&self, args: &[&str]) -> Result<Vec<u8>> {
        let output = self.command(args).output().context("Failed to run git")?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.first().copied().unwrap_or(""),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output.stdout)
    }

    /// Run git; a non-zero exit is `None` rather than an error. For
    /// `--verify --quiet` style probes.
    pub(crate) fn run_optional(&self, args: &[&str]) -> Result<Option<String>> {
        let output = self.command(args).output().context("Failed to run git")?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        ))
    }

    /// Run git feeding `input` on stdin, returning trimmed stdout.
    pub(crate) fn run_with_stdin(
        &self,
        args: &[&str],
        envs: &[(&str, &str)],
        input: &[u8],
    ) -> Result<String> {
        use std::io::Write;

        let mut command = self.command(args);
        for (key, value) in envs {
            command.env(key, value);
        }
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn git")?;
        child
            .stdin
            .as_mut()
            .context("git stdin unavailable")?
            .write_all(input)
            .context("Failed to write to git stdin")?;
        let output = child.wait_with_output().context("Failed to wait for git")?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.first().copied().unwrap_or(""),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run git with extra environment variables set (temp index plumbing).
    pub(crate) fn run_env(&self, args: &[&str], envs: &[(&str, &str)]) -> Result<String> {
        let mut command = self.command(args);
        for (key, value) in envs {
            command.env(key, value);
        }
        let output = command.output().context("Failed to run git")?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.first().copied().unwrap_or(""),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub(crate) fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new("git");
        command.args(args).current_dir(&self.workdir);
        command
    }
}

fn git_in(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .context("Failed to run git")?;
    if !output.status.success() {
        bail!(
            "git {} failed in {}: {}",
            args.first().copied().unwrap_or(""),
            dir.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}


#[cfg(test)]
mod tests {
    use super::testutil::init_repo;
    use super::*;

    #[test]
    fn test_discover_finds_workdir_and_common_dir() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        assert!(repo.workdir().join("README.md").exists());
        assert!(repo.common_dir().ends_with(".git"));
        assert!(repo.is_primary_worktree());
    }

    #[test]
    fn test_head_commit_present_after_first_commit() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        let head = repo.head_commit().unwrap();
        assert!(head.is_some());
        assert_eq!(head.unwrap().len(), 40);
    }

    #[test]
    fn test_rebase_not_in_progress_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        assert!(!repo.rebase_in_progress());
    }

    #[test]
    fn test_rebase_detected_via_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        std::fs::create_dir(repo.git_dir().join("rebase-merge")).unwrap();
        assert!(repo.rebase_in_progress());
    }
}
