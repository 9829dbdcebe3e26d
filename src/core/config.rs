//! Deployment configuration loaded from `.provergate/config.toml`.
//!
//! A missing file is not an error: every field has a default, and defaults are
//! built fresh on each load.

use crate::core::error::ProverGateError;
use crate::core::gate::RequiredValidations;
use crate::core::verdict::VerdictStatus;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory (relative to the workspace root) holding config, ledger and audit log.
pub const STATE_DIR: &str = ".provergate";
pub const CONFIG_FILE: &str = "config.toml";

/// Tuning flags handed to the Solana verification engine via `--prover_args`.
pub const DEFAULT_SOLANA_PROVER_ARGS: &[&str] = &[
    "-solanaOptimisticJoin true",
    "-solanaOptimisticOverlaps true",
    "-solanaOptimisticMemcpyPromotion true",
    "-solanaOptimisticMemcmp true",
    "-solanaOptimisticNoMemmove true",
    "-unsatCoresForAllAsserts true",
    "-solanaAggressiveGlobalDetection true",
    "-solanaTACOptimize 0",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    #[default]
    Default,
    Solana,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Build-and-test executable, invoked as `check` / `test` / `test --features <f>`.
    pub tool: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            tool: "cargo".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProverConfig {
    pub binary: String,
    /// Passed after `--prover_args`; omitted entirely when empty.
    pub args: Vec<String>,
    /// Value for `--rule_sanity`; `None` drops the flag.
    pub rule_sanity: Option<String>,
    /// Verdict for output that matches none of the parser heuristics.
    pub unmatched_verdict: VerdictStatus,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            binary: "certoraSolanaProver".to_string(),
            args: DEFAULT_SOLANA_PROVER_ARGS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rule_sanity: Some("basic".to_string()),
            unmatched_verdict: VerdictStatus::Verified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub capture_output: bool,
    /// Keep the materialized directory after the run (debugging).
    pub keep_folder: bool,
    /// Kill external tools after this many seconds. `None` waits forever.
    pub timeout_secs: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            capture_output: true,
            keep_folder: false,
            timeout_secs: None,
        }
    }
}

impl RunOptions {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub mode: DeploymentMode,
    /// Overrides the mode's required validations when set.
    pub required_validations: Option<RequiredValidations>,
    /// Project manifest that must exist in the materialized workspace.
    pub manifest: String,
    pub build: BuildConfig,
    pub prover: ProverConfig,
    pub run: RunOptions,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            mode: DeploymentMode::Default,
            required_validations: None,
            manifest: "Cargo.toml".to_string(),
            build: BuildConfig::default(),
            prover: ProverConfig::default(),
            run: RunOptions::default(),
        }
    }
}

impl GateConfig {
    pub fn required_validations(&self) -> RequiredValidations {
        match (&self.required_validations, self.mode) {
            (Some(explicit), _) => explicit.clone(),
            (None, DeploymentMode::Default) => RequiredValidations::default_mode(),
            (None, DeploymentMode::Solana) => RequiredValidations::solana_mode(),
        }
    }
}

pub fn state_dir(workspace_root: &Path) -> PathBuf {
    workspace_root.join(STATE_DIR)
}

pub fn config_path(workspace_root: &Path) -> PathBuf {
    state_dir(workspace_root).join(CONFIG_FILE)
}

pub fn parse_config(content: &str) -> Result<GateConfig, ProverGateError> {
    Ok(toml::from_str(content)?)
}

/// Load `<root>/.provergate/config.toml`, falling back to defaults when absent.
pub fn load_config(workspace_root: &Path) -> Result<GateConfig, ProverGateError> {
    let path = config_path(workspace_root);
    if !path.exists() {
        return Ok(GateConfig::default());
    }
    let content = fs::read_to_string(&path).map_err(ProverGateError::IoError)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ledger::ValidationKind;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let cfg = load_config(dir.path()).unwrap();
        assert_eq!(cfg, GateConfig::default());
        assert_eq!(cfg.build.tool, "cargo");
        assert_eq!(cfg.prover.binary, "certoraSolanaProver");
        assert_eq!(cfg.run.timeout(), None);
        assert_eq!(cfg.prover.unmatched_verdict, VerdictStatus::Verified);
    }

    #[test]
    fn mode_selects_required_validations() {
        let default_cfg = parse_config("").unwrap();
        assert_eq!(
            default_cfg.required_validations().iter().collect::<Vec<_>>(),
            vec![ValidationKind::FormalVerification]
        );

        let solana = parse_config("mode = \"solana\"\n").unwrap();
        assert_eq!(
            solana.required_validations().iter().collect::<Vec<_>>(),
            vec![
                ValidationKind::BuildAndTest,
                ValidationKind::FormalVerification
            ]
        );
    }

    #[test]
    fn explicit_required_validations_override_mode() {
        let cfg = parse_config(
            r#"
mode = "solana"
required_validations = ["requirements-review", "formal-verification"]
manifest = "Project.toml"

[build]
tool = "/opt/bin/cargo"

[prover]
binary = "prover-stub"
args = []
rule_sanity = "advanced"
unmatched_verdict = "ERROR"

[run]
keep_folder = true
timeout_secs = 90
"#,
        )
        .unwrap();
        let req = cfg.required_validations();
        assert!(!req.contains(ValidationKind::BuildAndTest));
        assert!(req.contains(ValidationKind::RequirementsReview));
        assert_eq!(cfg.manifest, "Project.toml");
        assert_eq!(cfg.build.tool, "/opt/bin/cargo");
        assert_eq!(cfg.prover.binary, "prover-stub");
        assert!(cfg.prover.args.is_empty());
        assert_eq!(cfg.prover.rule_sanity.as_deref(), Some("advanced"));
        assert_eq!(cfg.prover.unmatched_verdict, VerdictStatus::Error);
        assert!(cfg.run.keep_folder);
        assert!(cfg.run.capture_output);
        assert_eq!(cfg.run.timeout(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn unknown_kind_is_a_config_error() {
        let err = parse_config("required_validations = [\"tests\"]\n").unwrap_err();
        assert!(matches!(err, ProverGateError::ConfigError(_)));
    }

    #[test]
    fn defaults_are_fresh_per_call() {
        let mut first = GateConfig::default();
        first.prover.args.push("-extra true".to_string());
        let second = GateConfig::default();
        assert_eq!(second.prover.args.len(), DEFAULT_SOLANA_PROVER_ARGS.len());
    }
}
