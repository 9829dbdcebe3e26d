//! provergate: a validation gate in front of formal verification.
//!
//! Running a formal prover is slow and expensive. provergate makes sure the
//! cheap checks (compile, unit tests, feature tests) have passed on the
//! *current* content of a workspace before the prover is allowed to run, and
//! turns the prover's plain-text output into per-rule verdicts.
//!
//! # Architecture
//!
//! - **Fingerprint** ([`core::digest`]): SHA-256 over the workspace content set, path-ordered
//! - **Ledger** ([`core::ledger`], [`core::store`]): validation kind → fingerprint at last success
//! - **Gate** ([`core::gate`]): blocks an operation until its prerequisites are fresh
//! - **Process runner** ([`core::process`]): external tools, classified failures, optional timeout
//! - **Checks** ([`core::checks`]): `check` → `test` → `test --features <f>` with a bounded report
//! - **Parser** ([`core::parser`]): layered heuristics over unstructured engine output
//! - **Report/audit** ([`core::report`], [`core::audit`]): markdown report, JSONL event stream
//!
//! The tool surfaces in [`plugins`] compose these and turn every failure into
//! guidance text plus a ledger update on full success.
//!
//! # Examples
//!
//! ```bash
//! # Fingerprint the workspace
//! provergate digest
//!
//! # Build and test; records build-and-test on success
//! provergate check --feature rt
//!
//! # Allowed only when build-and-test is fresh (solana mode)
//! provergate prove --rule rule_vault_solvency_deposit
//! ```

pub mod core;
pub mod plugins;

mod cli;

use crate::core::{
    audit::JsonlSink,
    config::{self, GateConfig},
    digest::Fingerprint,
    error::ProverGateError,
    gate::{self, GateDecision, Operation},
    ledger::{Ledger, LedgerUpdate, ValidationKind},
    parser,
    process::SystemRunner,
    store::LedgerStore,
    time::{self, CommandEnvelope},
    workspace::{TempDirMaterializer, WorkspaceState, state_fingerprint},
};
use crate::plugins::{ToolContext, ToolResponse, prover, quick_tests};
use clap::Parser;
use cli::{Cli, Command, LedgerCommand, OperationArg, RunOverrides};
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::io::Read;
use std::path::Path;

#[derive(Serialize)]
struct DigestReport<'a> {
    fingerprint: &'a Fingerprint,
    files: usize,
}

#[derive(Serialize)]
struct GateReport<'a> {
    operation: String,
    fingerprint: &'a Fingerprint,
    decision: &'a GateDecision,
}

#[derive(Serialize)]
struct LedgerRow<'a> {
    kind: ValidationKind,
    fingerprint: &'a Fingerprint,
    recorded_at: i64,
    fresh: bool,
}

#[derive(Serialize)]
struct LedgerReport<'a> {
    current_fingerprint: &'a Fingerprint,
    entries: Vec<LedgerRow<'a>>,
}

/// Parse arguments from the process environment and execute.
pub fn run() -> Result<(), ProverGateError> {
    let cli = Cli::parse();
    let root = match &cli.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(ProverGateError::IoError)?,
    };
    dispatch(cli.command, &root)
}

fn dispatch(command: Command, root: &Path) -> Result<(), ProverGateError> {
    let mut config = config::load_config(root)?;
    let state_dir = config::state_dir(root);

    match command {
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&schema())?);
            Ok(())
        }
        Command::Parse(args) => {
            let output = match &args.file {
                Some(path) => fs::read_to_string(path).map_err(ProverGateError::IoError)?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .map_err(ProverGateError::IoError)?;
                    buf
                }
            };
            let verdict =
                parser::parse_with_fallback(&output, &args.rule, config.prover.unmatched_verdict);
            println!("{}", verdict);
            Ok(())
        }
        Command::Digest(args) => {
            let state = WorkspaceState::load_dir(root)?;
            let fp = state_fingerprint(&TempDirMaterializer::new(), &state);
            if args.format == "json" {
                let env = CommandEnvelope::new(
                    "digest",
                    "ok",
                    DigestReport {
                        fingerprint: &fp,
                        files: state.len(),
                    },
                );
                println!("{}", serde_json::to_string_pretty(&env)?);
            } else {
                println!("{}", fp);
            }
            Ok(())
        }
        Command::Gate(args) => {
            let state = load_state(root, &state_dir)?;
            let fp = state_fingerprint(&TempDirMaterializer::new(), &state);
            let operation = match args.operation {
                OperationArg::Prove => Operation::RunProver {
                    rule: args.rule.clone(),
                },
                OperationArg::Check => Operation::RunChecks,
                OperationArg::Deliver => Operation::Deliver,
            };
            let decision = gate::evaluate(
                &operation,
                &config.required_validations(),
                &state.validation,
                &fp,
            );
            if args.format.format == "json" {
                let env = CommandEnvelope::new(
                    "gate",
                    if decision.allowed { "ok" } else { "denied" },
                    GateReport {
                        operation: operation.label(),
                        fingerprint: &fp,
                        decision: &decision,
                    },
                );
                println!("{}", serde_json::to_string_pretty(&env)?);
            } else if decision.allowed {
                println!("{} {} may run", "✓".bright_green(), operation.label());
            } else {
                println!(
                    "{} {} is blocked",
                    "✗".bright_red(),
                    operation.label().bold()
                );
            }
            match decision.reason {
                Some(reason) if !decision.allowed => Err(ProverGateError::StaleValidation(reason)),
                _ => Ok(()),
            }
        }
        Command::Check(args) => {
            apply_overrides(&mut config, &args.overrides);
            let state = load_state(root, &state_dir)?;
            let response = with_context(&config, &state_dir, |ctx| {
                quick_tests::run_quick_tests(ctx, &state, &args.features, !args.no_tests)
            });
            finish(response, &state_dir, "checks failed")
        }
        Command::Prove(args) => {
            apply_overrides(&mut config, &args.overrides);
            let state = load_state(root, &state_dir)?;
            let tool_id = args.tool_id.clone().unwrap_or_else(time::new_event_id);
            let response = with_context(&config, &state_dir, |ctx| {
                prover::run_prover(ctx, &state, &args.rule, &tool_id)
            });
            finish(response, &state_dir, "verification did not succeed")
        }
        Command::Ledger(args) => match args.command {
            LedgerCommand::Show(fmt) => show_ledger(root, &state_dir, &fmt.format),
            LedgerCommand::Merge { from } => merge_ledger(&state_dir, &from),
        },
    }
}

fn apply_overrides(config: &mut GateConfig, overrides: &RunOverrides) {
    if overrides.keep_folder {
        config.run.keep_folder = true;
    }
    if overrides.timeout_secs.is_some() {
        config.run.timeout_secs = overrides.timeout_secs;
    }
}

/// Workspace content from disk plus the persisted ledger.
fn load_state(root: &Path, state_dir: &Path) -> Result<WorkspaceState, ProverGateError> {
    let mut state = WorkspaceState::load_dir(root)?;
    state.validation = LedgerStore::open(state_dir)?.load()?;
    Ok(state)
}

fn with_context<F>(config: &GateConfig, state_dir: &Path, f: F) -> ToolResponse
where
    F: FnOnce(&mut ToolContext<'_>) -> ToolResponse,
{
    let materializer = TempDirMaterializer::new();
    let runner = SystemRunner;
    let mut sink = JsonlSink::in_state_dir(state_dir);
    let mut ctx = ToolContext {
        config,
        materializer: &materializer,
        runner: &runner,
        sink: &mut sink,
    };
    f(&mut ctx)
}

/// Print the response, persist its ledger update, map failure to an error.
fn finish(
    response: ToolResponse,
    state_dir: &Path,
    failure: &str,
) -> Result<(), ProverGateError> {
    println!("{}", response.content);
    if !response.ledger_update.is_empty() {
        let store = LedgerStore::open(state_dir)?;
        store.merge(&response.ledger_update)?;
        for (kind, entry) in &response.ledger_update {
            println!(
                "{} recorded {} at {}",
                "✓".bright_green(),
                kind.to_string().bright_white(),
                entry.fingerprint.short().bright_cyan()
            );
        }
    }
    if response.success {
        Ok(())
    } else {
        Err(ProverGateError::ValidationError(failure.to_string()))
    }
}

fn show_ledger(root: &Path, state_dir: &Path, format: &str) -> Result<(), ProverGateError> {
    let state = load_state(root, state_dir)?;
    let current = state_fingerprint(&TempDirMaterializer::new(), &state);

    if format == "json" {
        let entries: Vec<LedgerRow<'_>> = state
            .validation
            .entries()
            .map(|(kind, entry)| LedgerRow {
                kind,
                fingerprint: &entry.fingerprint,
                recorded_at: entry.recorded_at,
                fresh: entry.fingerprint == current,
            })
            .collect();
        let env = CommandEnvelope::new(
            "ledger.show",
            "ok",
            LedgerReport {
                current_fingerprint: &current,
                entries,
            },
        );
        println!("{}", serde_json::to_string_pretty(&env)?);
        return Ok(());
    }

    println!("Current fingerprint: {}", current.as_str().bright_cyan());
    for kind in ValidationKind::ALL {
        print_ledger_line(kind, &state.validation, &current);
    }
    Ok(())
}

fn print_ledger_line(kind: ValidationKind, ledger: &Ledger, current: &Fingerprint) {
    match ledger.entry(kind) {
        None => println!("  {:<22} {}", kind.to_string(), "never validated".dimmed()),
        Some(entry) if &entry.fingerprint == current => println!(
            "  {:<22} {} {}",
            kind.to_string(),
            entry.fingerprint.short(),
            "fresh".bright_green()
        ),
        Some(entry) => println!(
            "  {:<22} {} {}",
            kind.to_string(),
            entry.fingerprint.short(),
            "stale".bright_yellow()
        ),
    }
}

fn merge_ledger(state_dir: &Path, from: &Path) -> Result<(), ProverGateError> {
    let content = fs::read_to_string(from).map_err(ProverGateError::IoError)?;
    let update: LedgerUpdate = serde_json::from_str(&content)?;
    let merged = LedgerStore::open(state_dir)?.merge(&update)?;
    println!("{}", serde_json::to_string_pretty(&merged)?);
    Ok(())
}

/// Describes configuration, events and storage of the subsystem.
pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "provergate",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Validation gate in front of formal verification, with per-rule verdict extraction",
        "config_file": ".provergate/config.toml",
        "config_schema": {
            "mode": "default | solana",
            "required_validations": ["formal-verification | build-and-test | requirements-review"],
            "manifest": "string (default: Cargo.toml)",
            "build": { "tool": "string (default: cargo)" },
            "prover": {
                "binary": "string (default: certoraSolanaProver)",
                "args": ["string array, passed after --prover_args"],
                "rule_sanity": "string (default: basic)",
                "unmatched_verdict": "VERIFIED | ERROR | ... (default: VERIFIED)"
            },
            "run": {
                "capture_output": "bool (default: true)",
                "keep_folder": "bool (default: false)",
                "timeout_secs": "integer (default: none)"
            }
        },
        "events": ["prover_run", "rule_result", "prover_result", "check_result"],
        "storage": ["ledger.db", "audit.events.jsonl"]
    })
}
