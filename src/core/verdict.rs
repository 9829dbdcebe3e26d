//! Per-rule verdict model shared by the parser, report renderer and audit stream.

use crate::core::error::ProverGateError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictStatus {
    Verified,
    Violated,
    Timeout,
    /// Rule passed vacuously. Never inferred from text.
    SanityFail,
    /// Internal engine failure. Never inferred from text.
    Error,
}

impl VerdictStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerdictStatus::Verified => "VERIFIED",
            VerdictStatus::Violated => "VIOLATED",
            VerdictStatus::Timeout => "TIMEOUT",
            VerdictStatus::SanityFail => "SANITY_FAIL",
            VerdictStatus::Error => "ERROR",
        }
    }

    pub fn is_verified(self) -> bool {
        self == VerdictStatus::Verified
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerdictStatus {
    type Err = ProverGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VERIFIED" => Ok(VerdictStatus::Verified),
            "VIOLATED" => Ok(VerdictStatus::Violated),
            "TIMEOUT" => Ok(VerdictStatus::Timeout),
            "SANITY_FAIL" => Ok(VerdictStatus::SanityFail),
            "ERROR" => Ok(VerdictStatus::Error),
            other => Err(ProverGateError::ValidationError(format!(
                "unknown verdict status '{}'",
                other
            ))),
        }
    }
}

/// Identifies a rule inside a verification run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RulePath {
    pub rule: String,
}

impl RulePath {
    pub fn new(rule: impl Into<String>) -> Self {
        RulePath { rule: rule.into() }
    }
}

impl fmt::Display for RulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rule)
    }
}

/// Counterexample attached to a violated rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Counterexample {
    Text(String),
    Structured(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub path: RulePath,
    pub status: VerdictStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterexample: Option<Counterexample>,
}

impl RuleResult {
    pub fn new(rule: impl Into<String>, status: VerdictStatus) -> Self {
        RuleResult {
            path: RulePath::new(rule),
            status,
            counterexample: None,
        }
    }

    pub fn with_counterexample(mut self, cex: Counterexample) -> Self {
        self.counterexample = Some(cex);
        self
    }
}
