//! Best-effort verdict extraction from unstructured verification-engine output.
//!
//! Heuristics, first match wins:
//! 1. `<rule> : VERIFIED|PASSED` → VERIFIED
//! 2. `<rule> : VIOLATED|FAILED` → VIOLATED
//! 3. `<rule> : TIMEOUT` → TIMEOUT
//! 4. `VERIFIED` anywhere and the rule name anywhere → VERIFIED
//! 5. `VIOLATED` or `FAILED` anywhere → VIOLATED
//! 6. the configured fallback
//!
//! The separator may be `:` or `-`; all matching ignores case. SANITY_FAIL and
//! ERROR are never produced here.

use crate::core::process::combine_output;
use crate::core::verdict::{RuleResult, VerdictStatus};
use regex::Regex;

/// Fallback used when the caller has no configured preference.
pub const DEFAULT_UNMATCHED: VerdictStatus = VerdictStatus::Verified;

fn rule_verdict_pattern(rule: &str, verdicts: &str) -> Option<Regex> {
    Regex::new(&format!(
        r"(?i)\b({})\s*[:\-]\s*({})",
        regex::escape(rule),
        verdicts
    ))
    .ok()
}

fn has_rule_verdict(output: &str, rule: &str, verdicts: &str) -> bool {
    rule_verdict_pattern(rule, verdicts).is_some_and(|re| re.is_match(output))
}

/// Classify `output` for `rule`, using `unmatched` when no heuristic fires.
pub fn parse_with_fallback(output: &str, rule: &str, unmatched: VerdictStatus) -> VerdictStatus {
    if has_rule_verdict(output, rule, "VERIFIED|PASSED") {
        return VerdictStatus::Verified;
    }
    if has_rule_verdict(output, rule, "VIOLATED|FAILED") {
        return VerdictStatus::Violated;
    }
    if has_rule_verdict(output, rule, "TIMEOUT") {
        return VerdictStatus::Timeout;
    }

    let upper = output.to_uppercase();
    if upper.contains("VERIFIED") && output.to_lowercase().contains(&rule.to_lowercase()) {
        return VerdictStatus::Verified;
    }
    if upper.contains("VIOLATED") || upper.contains("FAILED") {
        return VerdictStatus::Violated;
    }
    unmatched
}

/// Classify `output` for `rule` with the fail-open default.
pub fn parse(output: &str, rule: &str) -> VerdictStatus {
    parse_with_fallback(output, rule, DEFAULT_UNMATCHED)
}

/// Results for one engine run.
///
/// With `captured` set, `None` means the engine printed nothing at all. When
/// output went to the terminal instead there is nothing to scan, so the
/// verdict is the `unmatched` fallback.
pub fn extract_results(
    stdout: &str,
    stderr: &str,
    captured: bool,
    rule: &str,
    unmatched: VerdictStatus,
) -> Option<Vec<RuleResult>> {
    let combined = combine_output(stdout, stderr);
    if captured && combined.trim().is_empty() {
        return None;
    }
    let status = parse_with_fallback(&combined, rule, unmatched);
    Some(vec![RuleResult::new(rule, status)])
}
