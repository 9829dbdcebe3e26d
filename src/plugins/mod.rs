//! Tool surfaces called by the orchestration layer.
//!
//! Each surface runs to completion and answers with text plus an optional
//! ledger update. Errors never escape as failures: they are turned into
//! guidance the caller can act on.

pub mod prover;

use crate::core::audit::AuditSink;
use crate::core::config::GateConfig;
use crate::core::error::ProverGateError;
use crate::core::ledger::LedgerUpdate;
use crate::core::process::CommandRunner;
use crate::core::verdict::RuleResult;
use crate::core::workspace::Materializer;

/// Collaborators a tool surface runs against.
pub struct ToolContext<'a> {
    pub config: &'a GateConfig,
    pub materializer: &'a dyn Materializer,
    pub runner: &'a dyn CommandRunner,
    pub sink: &'a mut dyn AuditSink,
}

#[derive(Debug, Clone, Default)]
pub struct ToolResponse {
    pub content: String,
    /// Entries to merge into the owning workspace state. Empty unless every stage succeeded.
    pub ledger_update: LedgerUpdate,
    pub success: bool,
    pub results: Vec<RuleResult>,
}

impl ToolResponse {
    pub fn failure(content: impl Into<String>) -> Self {
        ToolResponse {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn from_error(err: &ProverGateError) -> Self {
        ToolResponse::failure(err.guidance())
    }
}
