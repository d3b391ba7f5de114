//! Content-derived checkpoint identifiers.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of a checkpoint ID in hex characters.
pub const CHECKPOINT_ID_LEN: usize = 12;

/// A 12-hex-character checkpoint identifier.
///
/// Derived from the snapshot tree hash plus the session ID, so re-running
/// the same input always produces the same ID.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointId(String);

impl CheckpointId {
    /// Derive the ID for a snapshot: first 12 hex characters of
    /// `SHA-256(tree_oid || session_id)`.
    pub fn derive(tree_oid: &str, session_id: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(tree_oid.as_bytes());
        hasher.update(session_id.as_bytes());
        let digest = hasher.finalize();
        let hex: String = digest
            .iter()
            .flat_map(|b| [b >> 4, b & 0x0f])
            .map(|n| char::from_digit(n as u32, 16).unwrap())
            .take(CHECKPOINT_ID_LEN)
            .collect();
        Self(hex)
    }

    /// Validate and wrap a user-supplied ID string.
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        if s.len() == CHECKPOINT_ID_LEN && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
        {
            Ok(Self(s.to_string()))
        } else {
            Err(EngineError::InvalidCheckpointId(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into the 256-way fan-out directory pair: `(id[0..2], id[2..12])`.
    pub fn fan_out(&self) -> (&str, &str) {
        (&self.0[..2], &self.0[2..])
    }

    /// The fan-out path inside the metadata tree, e.g. `a1/b2c3d4e5f6`.
    pub fn dir_path(&self) -> String {
        let (prefix, rest) = self.fan_out();
        format!("{prefix}/{rest}")
    }
}

impl std::fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for CheckpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckpointId({})", self.0)
    }
}

impl std::str::FromStr for CheckpointId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
