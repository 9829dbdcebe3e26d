//! Gate policy: may an operation run on the current workspace content?
//!
//! An operation depends on zero or more validation kinds. A dependency counts
//! only when the deployment lists it in its required validations, and it is
//! satisfied only when the ledger entry for that kind was recorded at exactly
//! the current fingerprint. Any content change (comments included) voids every
//! prior pass.

use crate::core::digest::Fingerprint;
use crate::core::ledger::{Ledger, ValidationKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered, duplicate-free set of validation kinds a deployment requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ValidationKind>", into = "Vec<ValidationKind>")]
pub struct RequiredValidations(Vec<ValidationKind>);

impl RequiredValidations {
    pub fn new(kinds: impl IntoIterator<Item = ValidationKind>) -> Self {
        let mut out: Vec<ValidationKind> = Vec::new();
        for kind in kinds {
            if !out.contains(&kind) {
                out.push(kind);
            }
        }
        RequiredValidations(out)
    }

    /// Default deployments only track the prover itself.
    pub fn default_mode() -> Self {
        Self::new([ValidationKind::FormalVerification])
    }

    /// Solana deployments must build and test before proving.
    pub fn solana_mode() -> Self {
        Self::new([
            ValidationKind::BuildAndTest,
            ValidationKind::FormalVerification,
        ])
    }

    pub fn contains(&self, kind: ValidationKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = ValidationKind> + '_ {
        self.0.iter().copied()
    }
}

impl From<Vec<ValidationKind>> for RequiredValidations {
    fn from(kinds: Vec<ValidationKind>) -> Self {
        RequiredValidations::new(kinds)
    }
}

impl From<RequiredValidations> for Vec<ValidationKind> {
    fn from(req: RequiredValidations) -> Self {
        req.0
    }
}

/// Operations the gate is consulted for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Compile and test; the cheap prerequisite itself.
    RunChecks,
    /// Run the formal prover for one rule.
    RunProver { rule: String },
    /// Hand the finished code back to the caller.
    Deliver,
}

impl Operation {
    /// Kinds this operation depends on, before filtering by deployment.
    fn dependencies(&self, required: &RequiredValidations) -> Vec<ValidationKind> {
        match self {
            Operation::RunChecks => Vec::new(),
            Operation::RunProver { .. } => vec![ValidationKind::BuildAndTest],
            Operation::Deliver => required.iter().collect(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Operation::RunChecks => "check".to_string(),
            Operation::RunProver { rule } => format!("prove --rule {}", rule),
            Operation::Deliver => "deliver".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    NeverValidated,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Denial {
    pub kind: DenialKind,
    pub prerequisite: ValidationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub denial: Option<Denial>,
}

impl GateDecision {
    pub fn allow() -> Self {
        GateDecision {
            allowed: true,
            reason: None,
            denial: None,
        }
    }

    fn deny(kind: DenialKind, prerequisite: ValidationKind) -> Self {
        GateDecision {
            allowed: false,
            reason: Some(denial_reason(kind, prerequisite)),
            denial: Some(Denial { kind, prerequisite }),
        }
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.allowed, &self.reason) {
            (true, _) => write!(f, "allowed"),
            (false, Some(reason)) => write!(f, "denied: {}", reason),
            (false, None) => write!(f, "denied"),
        }
    }
}

/// The tool surface that re-establishes a validation kind.
pub fn remedy_for(kind: ValidationKind) -> &'static str {
    match kind {
        ValidationKind::BuildAndTest => "quick-tests",
        ValidationKind::FormalVerification => "prove",
        ValidationKind::RequirementsReview => "requirements review",
    }
}

fn denial_reason(kind: DenialKind, prerequisite: ValidationKind) -> String {
    let remedy = remedy_for(prerequisite);
    match kind {
        DenialKind::NeverValidated => format!(
            "'{}' was never validated for this workspace. Run `{}` first and make sure every stage passes before retrying.",
            prerequisite, remedy
        ),
        DenialKind::Stale => format!(
            "The workspace changed since '{}' last passed. Re-run `{}` on the current content before retrying.",
            prerequisite, remedy
        ),
    }
}

/// Decide whether `operation` may proceed on content with `current`.
///
/// Computed fresh on every call; never cache the result across requests.
pub fn evaluate(
    operation: &Operation,
    required: &RequiredValidations,
    ledger: &Ledger,
    current: &Fingerprint,
) -> GateDecision {
    for prerequisite in operation.dependencies(required) {
        if !required.contains(prerequisite) {
            continue;
        }
        match ledger.lookup(prerequisite) {
            None => return GateDecision::deny(DenialKind::NeverValidated, prerequisite),
            Some(recorded) if recorded != current => {
                return GateDecision::deny(DenialKind::Stale, prerequisite);
            }
            Some(_) => {}
        }
    }
    GateDecision::allow()
}
