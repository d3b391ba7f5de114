//! Branch naming and compare-and-swap reference updates.

use crate::repo::Repo;
use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};

/// The single repository-wide metadata branch.
pub const METADATA_BRANCH: &str = "entire/checkpoints/v1";

/// Namespace prefix for all engine-owned branches.
pub const BRANCH_NAMESPACE: &str = "entire/";

pub const ZERO_OID: &str = "0000000000000000000000000000000000000000";

/// Shadow branch name for a `(base_commit, worktree)` anchor:
/// `entire/<short-base>[-<worktree-suffix>]`.
pub fn shadow_branch_name(base_commit: &str, worktree_suffix: Option<&str>) -> String {
    let short = &base_commit[..base_commit.len().min(8)];
    match worktree_suffix {
        Some(suffix) => format!("{BRANCH_NAMESPACE}{short}-{suffix}"),
        None => format!("{BRANCH_NAMESPACE}{short}"),
    }
}

/// Stable 8-hex suffix distinguishing a linked worktree's shadow branches.
pub fn worktree_suffix(worktree_id: &str) -> String {
    let digest = Sha256::digest(worktree_id.as_bytes());
    digest
        .iter()
        .flat_map(|b| [b >> 4, b & 0x0f])
        .map(|n| char::from_digit(n as u32, 16).unwrap())
        .take(8)
        .collect()
}

impl Repo {
    /// Shadow branch suffix for this worktree; `None` in the primary one.
    pub fn shadow_suffix(&self) -> Option<String> {
        if self.is_primary_worktree() {
            None
        } else {
            Some(worktree_suffix(&self.worktree_id()))
        }
    }

    /// Resolve a branch name to a commit OID, `None` when it does not exist.
    pub fn resolve_branch(&self, name: &str) -> Result<Option<String>> {
        let refname = format!("refs/heads/{name}");
        self.run_optional(&["rev-parse", "--verify", "--quiet", &refname])
    }

    /// Whether a loose ref file for the branch is present, resolvable or
    /// not. Distinguishes a deleted branch from a corrupted one.
    pub fn branch_ref_present(&self, name: &str) -> bool {
        self.common_dir().join("refs/heads").join(name).exists()
    }

    /// Move a branch with compare-and-swap semantics.
    ///
    /// `expected_old` of `None` asserts the branch does not exist yet.
    /// Returns `Ok(false)` when Git rejected the update because the branch
    /// no longer matched the expected value (somebody else moved it), which
    /// callers treat as a retry signal.
    pub fn update_branch_cas(
        &self,
        name: &str,
        new_oid: &str,
        expected_old: Option<&str>,
    ) -> Result<bool> {
        let refname = format!("refs/heads/{name}");
        let old = expected_old.unwrap_or(ZERO_OID);
        let output = self
            .command(&["update-ref", &refname, new_oid, old])
            .output()
            .context("Failed to run git update-ref")?;
        if output.status.success() {
            return Ok(true);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_cas_conflict(&stderr) {
            return Ok(false);
        }
        bail!("git update-ref {refname} failed: {}", stderr.trim());
    }

    /// Delete a branch, optionally asserting its current value.
    pub fn delete_branch(&self, name: &str, expected_old: Option<&str>) -> Result<bool> {
        let refname = format!("refs/heads/{name}");
        let mut args = vec!["update-ref", "-d", &refname];
        if let Some(old) = expected_old {
            args.push(old);
        }
        let output = self
            .command(&args)
            .output()
            .context("Failed to run git update-ref -d")?;
        if output.status.success() {
            return Ok(true);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_cas_conflict(&stderr) {
            return Ok(false);
        }
        bail!("git update-ref -d {refname} failed: {}", stderr.trim());
    }

    /// Branches under a name prefix, as `(short_name, oid)` pairs.
    pub fn list_branches(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let pattern = format!("refs/heads/{prefix}");
        let stdout = self.run(&[
            "for-each-ref",
            "--format=%(refname:lstrip=2) %(objectname)",
            &pattern,
        ])?;
        Ok(stdout
            .lines()
            .filter_map(|line| {
                let (name, oid) = line.split_once(' ')?;
                Some((name.to_string(), oid.to_string()))
            })
            .collect())
    }
}

// Git phrases reference races as lock or old-value mismatches; both mean
// "reload and retry", not "broken repository".
fn is_cas_conflict(stderr: &str) -> bool {
    stderr.contains("cannot lock ref")
        || stderr.contains("but expected")
        || stderr.contains("unable to update")
        || stderr.contains("reference already exists")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::testutil::init_repo;

    #[test]
    fn test_shadow_branch_name_shortens_base() {
        let name = shadow_branch_name("0123456789abcdef0123456789abcdef01234567", None);
        assert_eq!(name, "entire/01234567");
    }

    #[test]
    fn test_shadow_branch_name_with_suffix() {
        let name = shadow_branch_name("0123456789abcdef0123456789abcdef01234567", Some("aa11bb22"));
        assert_eq!(name, "entire/01234567-aa11bb22");
    }

    #[test]
    fn test_worktree_suffix_is_stable_hex() {
        let a = worktree_suffix("/home/user/project");
        let b = worktree_suffix("/home/user/project");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_branch_cas_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        let head = repo.head_commit().unwrap().unwrap();

        // Create.
        assert!(repo.update_branch_cas("entire/test", &head, None).unwrap());
        assert_eq!(
            repo.resolve_branch("entire/test").unwrap().as_deref(),
            Some(head.as_str())
        );

        // A second create with the same no-exist assertion must fail CAS.
        assert!(!repo.update_branch_cas("entire/test", &head, None).unwrap());

        // Move with a wrong expected old value must fail CAS.
        assert!(
            !repo
                .update_branch_cas("entire/test", &head, Some(ZERO_OID))
                .unwrap()
        );

        // Delete with the right old value succeeds.
        assert!(repo.delete_branch("entire/test", Some(&head)).unwrap());
        assert!(repo.resolve_branch("entire/test").unwrap().is_none());
    }

    #[test]
    fn test_list_branches_under_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let repo = init_repo(dir.path());
        let head = repo.head_commit().unwrap().unwrap();
        repo.update_branch_cas("entire/aaaa1111", &head, None)
            .unwrap();
        repo.update_branch_cas("entire/bbbb2222", &head, None)
            .unwrap();

        let mut names: Vec<String> = repo
            .list_branches("entire/")
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        names.sort();
        assert_eq!(names, ["entire/aaaa1111", "entire/bbbb2222"]);
    }
}
