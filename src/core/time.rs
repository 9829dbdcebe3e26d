//! Clock and identifier helpers for the ledger, audit stream and JSON output.

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use ulid::Ulid;

/// Milliseconds since the unix epoch. Orders ledger writes for merging.
pub fn now_epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Whole seconds with a `Z` suffix, as stamped on audit lines (`1771220592Z`).
pub fn now_epoch_z() -> String {
    format!("{}Z", now_epoch_millis() / 1000)
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Wrapper around every `--format json` answer: which command ran, whether it
/// went through, and the command's own report flattened alongside.
#[derive(Debug, Serialize)]
pub struct CommandEnvelope<T: Serialize> {
    pub cmd: &'static str,
    pub status: &'static str,
    pub ts: String,
    pub event_id: String,
    #[serde(flatten)]
    pub report: T,
}

impl<T: Serialize> CommandEnvelope<T> {
    pub fn new(cmd: &'static str, status: &'static str, report: T) -> Self {
        CommandEnvelope {
            cmd,
            status,
            ts: now_epoch_z(),
            event_id: new_event_id(),
            report,
        }
    }
}
