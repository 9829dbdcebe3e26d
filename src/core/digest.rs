//! Workspace fingerprinting.
//!
//! A fingerprint is a SHA-256 over every `(path, content)` pair of a
//! workspace, fed in path order. It exists for change detection between a
//! successful validation and a later request, not for integrity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex SHA-256 of the empty input; the fingerprint of an empty workspace.
pub const EMPTY_FINGERPRINT: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Opaque, order-independent digest of a workspace content set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(hex: impl Into<String>) -> Self {
        Fingerprint(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars, for terminal output.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint a content set given in any order.
///
/// Pairs are sorted by path bytes before hashing. Each pair is framed as
/// `path 0x00 len(content):u64le content` so renames, empty files and bytes
/// shifting across a file boundary all change the result.
pub fn fingerprint<I, P, C>(pairs: I) -> Fingerprint
where
    I: IntoIterator<Item = (P, C)>,
    P: AsRef<str>,
    C: AsRef<[u8]>,
{
    let mut sorted: Vec<(P, C)> = pairs.into_iter().collect();
    sorted.sort_by(|a, b| a.0.as_ref().as_bytes().cmp(b.0.as_ref().as_bytes()));

    let mut hasher = Sha256::new();
    for (path, content) in &sorted {
        let content = content.as_ref();
        hasher.update(path.as_ref().as_bytes());
        hasher.update([0u8]);
        hasher.update((content.len() as u64).to_le_bytes());
        hasher.update(content);
    }
    Fingerprint(format!("{:x}", hasher.finalize()))
}
