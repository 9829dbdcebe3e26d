//! Validation ledger: which validation kinds last passed, and at which fingerprint.
//!
//! The ledger keeps no history. Recording a success for a kind replaces the
//! previous entry, and absence means "never validated". Divergent copies are
//! reconciled with [`merge`], which keeps the most recently recorded entry per
//! kind.

use crate::core::digest::Fingerprint;
use crate::core::error::ProverGateError;
use crate::core::time;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Category of prerequisite check recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationKind {
    FormalVerification,
    BuildAndTest,
    RequirementsReview,
}

impl ValidationKind {
    pub const ALL: [ValidationKind; 3] = [
        ValidationKind::FormalVerification,
        ValidationKind::BuildAndTest,
        ValidationKind::RequirementsReview,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ValidationKind::FormalVerification => "formal-verification",
            ValidationKind::BuildAndTest => "build-and-test",
            ValidationKind::RequirementsReview => "requirements-review",
        }
    }
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationKind {
    type Err = ProverGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValidationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                ProverGateError::ValidationError(format!(
                    "unknown validation kind '{}' (expected one of: formal-verification, build-and-test, requirements-review)",
                    s
                ))
            })
    }
}

/// One ledger slot: the fingerprint a kind last passed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub fingerprint: Fingerprint,
    /// Epoch milliseconds; only used to order writes when merging.
    pub recorded_at: i64,
}

impl LedgerEntry {
    pub fn now(fingerprint: Fingerprint) -> Self {
        LedgerEntry {
            fingerprint,
            recorded_at: time::now_epoch_millis(),
        }
    }
}

/// Partial mapping returned by a tool surface on full success, to be merged
/// into the owning workspace state.
pub type LedgerUpdate = BTreeMap<ValidationKind, LedgerEntry>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: BTreeMap<ValidationKind, LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, kind: ValidationKind, fingerprint: Fingerprint) {
        self.entries.insert(kind, LedgerEntry::now(fingerprint));
    }

    pub fn lookup(&self, kind: ValidationKind) -> Option<&Fingerprint> {
        self.entries.get(&kind).map(|e| &e.fingerprint)
    }

    pub fn entry(&self, kind: ValidationKind) -> Option<&LedgerEntry> {
        self.entries.get(&kind)
    }

    pub fn entries(&self) -> impl Iterator<Item = (ValidationKind, &LedgerEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge an update into this ledger in place.
    pub fn apply(&mut self, update: LedgerUpdate) {
        let current = std::mem::take(&mut self.entries);
        self.entries = merge_maps(current, update);
    }
}

impl From<LedgerUpdate> for Ledger {
    fn from(entries: LedgerUpdate) -> Self {
        Ledger { entries }
    }
}

/// Last-write-wins merge of two ledgers.
///
/// Per kind, the entry with the larger `recorded_at` wins. On a tie the
/// right-hand side (the incoming update) wins.
pub fn merge(left: &Ledger, right: &Ledger) -> Ledger {
    Ledger {
        entries: merge_maps(left.entries.clone(), right.entries.clone()),
    }
}

fn merge_maps(mut left: LedgerUpdate, right: LedgerUpdate) -> LedgerUpdate {
    for (kind, incoming) in right {
        match left.get(&kind) {
            Some(existing) if existing.recorded_at > incoming.recorded_at => {}
            _ => {
                left.insert(kind, incoming);
            }
        }
    }
    left
}
