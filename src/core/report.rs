//! Rule verdict reports and their audit events.

use crate::core::audit::{AuditEvent, AuditSink, emit_or_warn};
use crate::core::verdict::{Counterexample, RuleResult};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Markdown report, one section per rule in the given order.
pub fn render_rule_report(results: &[RuleResult]) -> String {
    let mut out = String::new();
    let verified = results.iter().filter(|r| r.status.is_verified()).count();
    let _ = writeln!(
        out,
        "# Verification results ({}/{} rules verified)\n",
        verified,
        results.len()
    );

    for result in results {
        let _ = writeln!(out, "## Rule `{}`", result.path);
        let _ = writeln!(out, "**Status**: {}", result.status);
        match &result.counterexample {
            None => {}
            Some(Counterexample::Text(text)) => {
                let _ = writeln!(out, "**Counterexample**:\n```\n{}\n```", text.trim_end());
            }
            Some(Counterexample::Structured(value)) => {
                let pretty =
                    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
                let _ = writeln!(out, "**Counterexample**:\n```json\n{}\n```", pretty);
            }
        }
        out.push('\n');
    }
    out
}

pub fn all_verified(results: &[RuleResult]) -> bool {
    results.iter().all(|r| r.status.is_verified())
}

/// One `rule_result` event per rule, then one `prover_result` aggregate.
pub fn emit_rule_events(results: &[RuleResult], tool_id: &str, sink: &mut dyn AuditSink) {
    for result in results {
        emit_or_warn(
            sink,
            &AuditEvent::RuleResult {
                rule: result.path.rule.clone(),
                status: result.status,
                analysis: None,
                tool_id: tool_id.to_string(),
            },
        );
    }
    let status: BTreeMap<String, _> = results
        .iter()
        .map(|r| (r.path.rule.clone(), r.status))
        .collect();
    emit_or_warn(sink, &AuditEvent::ProverResult { status });
}
