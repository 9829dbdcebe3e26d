//! Formal verification of one rule via the external verification engine.
//!
//! Flow: gate → materialize → manifest check → `prover_run` event → engine →
//! verdict extraction → per-rule and aggregate events → report. Only a run in
//! which every rule is VERIFIED records `formal-verification` in the ledger.

use crate::core::audit::{AuditEvent, emit_or_warn};
use crate::core::config::GateConfig;
use crate::core::error::ProverGateError;
use crate::core::gate::{self, Operation};
use crate::core::ledger::{LedgerEntry, LedgerUpdate, ValidationKind};
use crate::core::parser;
use crate::core::process::{Invocation, ProcessError};
use crate::core::report;
use crate::core::verdict::{RuleResult, VerdictStatus};
use crate::core::workspace::{WorkspaceState, state_fingerprint};
use crate::plugins::{ToolContext, ToolResponse};
use std::path::Path;

/// Engine invocation for `rule`: `<engine> --rule <rule> [--prover_args ...] [--rule_sanity <level>]`.
pub fn prover_invocation(config: &GateConfig, project_dir: &Path, rule: &str) -> Invocation {
    let mut inv = Invocation::new(config.prover.binary.as_str(), project_dir)
        .args(["--rule", rule])
        .capture_output(config.run.capture_output)
        .timeout(config.run.timeout());
    if !config.prover.args.is_empty() {
        inv = inv
            .arg("--prover_args")
            .args(config.prover.args.iter().cloned());
    }
    if let Some(level) = &config.prover.rule_sanity {
        inv = inv.args(["--rule_sanity", level.as_str()]);
    }
    inv
}

pub fn run_prover(
    ctx: &mut ToolContext<'_>,
    state: &WorkspaceState,
    rule: &str,
    tool_id: &str,
) -> ToolResponse {
    let required = ctx.config.required_validations();
    let fingerprint = state_fingerprint(ctx.materializer, state);
    let operation = Operation::RunProver {
        rule: rule.to_string(),
    };
    let decision = gate::evaluate(&operation, &required, &state.validation, &fingerprint);
    if !decision.allowed {
        let reason = decision.reason.unwrap_or_default();
        return ToolResponse::from_error(&ProverGateError::StaleValidation(reason));
    }

    let dir = match ctx
        .materializer
        .materialize(state, ctx.config.run.keep_folder)
    {
        Ok(dir) => dir,
        Err(e) => return ToolResponse::from_error(&e),
    };

    if !dir.path().join(&ctx.config.manifest).exists() {
        return ToolResponse::from_error(&ProverGateError::MissingManifest {
            manifest: ctx.config.manifest.clone(),
        });
    }

    let invocation = prover_invocation(ctx.config, dir.path(), rule);
    emit_or_warn(
        ctx.sink,
        &AuditEvent::ProverRun {
            args: invocation.argv(),
        },
    );

    let outcome = match ctx.runner.run(&invocation) {
        Ok(outcome) => outcome,
        Err(e @ ProcessError::TimedOut { .. }) => {
            let results = vec![RuleResult::new(rule, VerdictStatus::Timeout)];
            report::emit_rule_events(&results, tool_id, ctx.sink);
            return ToolResponse {
                content: format!("Error: {}", e),
                results,
                ..Default::default()
            };
        }
        Err(e) => return ToolResponse::from_error(&ProverGateError::from(e)),
    };

    let Some(results) = parser::extract_results(
        &outcome.stdout,
        &outcome.stderr,
        ctx.config.run.capture_output,
        rule,
        ctx.config.prover.unmatched_verdict,
    ) else {
        let results = vec![RuleResult::new(rule, VerdictStatus::Error)];
        report::emit_rule_events(&results, tool_id, ctx.sink);
        let err = ProverGateError::UnparseableResult {
            engine: ctx.config.prover.binary.clone(),
            rule: rule.to_string(),
        };
        return ToolResponse {
            content: err.guidance(),
            results,
            ..Default::default()
        };
    };

    report::emit_rule_events(&results, tool_id, ctx.sink);
    let content = report::render_rule_report(&results);
    let success = report::all_verified(&results);

    let mut ledger_update = LedgerUpdate::new();
    if success {
        ledger_update.insert(
            ValidationKind::FormalVerification,
            LedgerEntry::now(fingerprint),
        );
    }
    ToolResponse {
        content,
        ledger_update,
        success,
        results,
    }
}
