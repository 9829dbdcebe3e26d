//! Structured progress/audit events.
//!
//! Events are pushed to a sink as they happen. Sinks do not buffer or retry;
//! a failed write is reported once as a warning and the run carries on.

use crate::core::error::ProverGateError;
use crate::core::time;
use crate::core::verdict::VerdictStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const AUDIT_LOG_FILE: &str = "audit.events.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// The verification engine is about to start.
    ProverRun { args: Vec<String> },
    /// One rule's verdict.
    RuleResult {
        rule: String,
        status: VerdictStatus,
        analysis: Option<String>,
        tool_id: String,
    },
    /// All verdicts of one run.
    ProverResult {
        status: BTreeMap<String, VerdictStatus>,
    },
    /// One build/test stage finished.
    CheckResult { command: String, passed: bool },
}

pub trait AuditSink {
    fn emit(&mut self, event: &AuditEvent) -> Result<(), ProverGateError>;
}

/// Emit an event, downgrading a delivery failure to a warning on stderr.
pub fn emit_or_warn(sink: &mut dyn AuditSink, event: &AuditEvent) {
    if let Err(e) = sink.emit(event) {
        eprintln!("Warning: failed to record audit event: {}", e);
    }
}

#[derive(Debug, Serialize)]
struct AuditLine<'a> {
    ts: String,
    event_id: String,
    #[serde(flatten)]
    event: &'a AuditEvent,
}

/// Appends one JSON object per event to a `.jsonl` file.
#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonlSink { path: path.into() }
    }

    /// Sink at `<state_dir>/audit.events.jsonl`.
    pub fn in_state_dir(state_dir: &Path) -> Self {
        JsonlSink::new(state_dir.join(AUDIT_LOG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlSink {
    fn emit(&mut self, event: &AuditEvent) -> Result<(), ProverGateError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(ProverGateError::IoError)?;
        }
        let line = AuditLine {
            ts: time::now_epoch_z(),
            event_id: time::new_event_id(),
            event,
        };
        let json = serde_json::to_string(&line)?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(ProverGateError::IoError)?;
        writeln!(f, "{}", json).map_err(ProverGateError::IoError)
    }
}

/// Collects events in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub events: Vec<AuditEvent>,
}

impl AuditSink for MemorySink {
    fn emit(&mut self, event: &AuditEvent) -> Result<(), ProverGateError> {
        self.events.push(event.clone());
        Ok(())
    }
}

/// Read back a JSONL audit log, skipping the envelope fields.
pub fn read_events(path: &Path) -> Result<Vec<AuditEvent>, ProverGateError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path).map_err(ProverGateError::IoError)?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<AuditEvent>(l).map_err(ProverGateError::from))
        .collect()
}
