//! Thin wrapper over the `git` binary.
//!
//! Everything the engine needs from Git goes through here: repository
//! discovery, blob/tree/commit plumbing, reference updates with
//! compare-and-swap semantics, and commit diff enumeration. All operations
//! shell out to `git`; correctness under concurrent hook invocations comes
//! from Git's own reference locking.

pub mod diff;
pub mod objects;
pub mod refs;
pub mod repo;

pub use objects::{Signature, TreeBuilder, TreeEntry};
pub use refs::{METADATA_BRANCH, shadow_branch_name, worktree_suffix};
pub use repo::Repo;
