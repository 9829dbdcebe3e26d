use provergate::core::audit::{AuditEvent, MemorySink};
use provergate::core::config::{DeploymentMode, GateConfig};
use provergate::core::ledger::ValidationKind;
use provergate::core::process::{CommandRunner, Invocation, ProcessError, ProcessOutcome};
use provergate::core::workspace::{TempDirMaterializer, WorkspaceState, state_fingerprint};
use provergate::plugins::ToolContext;
use provergate::plugins::quick_tests::run_quick_tests;
use std::cell::RefCell;
use std::path::PathBuf;

/// Fails the listed command lines, succeeds on everything else, and records
/// the working directory and manifest presence it saw.
#[derive(Default)]
struct StubBuildTool {
    failing: Vec<String>,
    calls: RefCell<Vec<String>>,
    saw_manifest: RefCell<Vec<bool>>,
    cwd: RefCell<Option<PathBuf>>,
}

impl StubBuildTool {
    fn failing(lines: &[&str]) -> Self {
        StubBuildTool {
            failing: lines.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }
}

impl CommandRunner for StubBuildTool {
    fn run(&self, inv: &Invocation) -> Result<ProcessOutcome, ProcessError> {
        let line = inv.command_line();
        self.calls.borrow_mut().push(line.clone());
        self.saw_manifest
            .borrow_mut()
            .push(inv.cwd.join("Cargo.toml").exists());
        *self.cwd.borrow_mut() = Some(inv.cwd.clone());
        if self.failing.contains(&line) {
            return Err(ProcessError::NonZeroExit {
                program: inv.program.clone(),
                code: 101,
                stdout: String::new(),
                stderr: format!("error: {} blew up", line),
            });
        }
        Ok(ProcessOutcome {
            exit_code: 0,
            stdout: format!("{} ok", line),
            stderr: String::new(),
        })
    }
}

fn project() -> WorkspaceState {
    WorkspaceState::new()
        .with_file("Cargo.toml", "[package]\nname = \"vault\"\n")
        .with_file("src/lib.rs", "pub fn deposit(a: u64) -> u64 { a }\n")
}

#[test]
fn passing_run_records_build_and_test_at_current_fingerprint() {
    let config = GateConfig::default();
    let materializer = TempDirMaterializer::new();
    let runner = StubBuildTool::default();
    let mut sink = MemorySink::default();
    let state = project();

    let response = {
        let mut ctx = ToolContext {
            config: &config,
            materializer: &materializer,
            runner: &runner,
            sink: &mut sink,
        };
        run_quick_tests(&mut ctx, &state, &["rt".to_string()], true)
    };

    assert!(response.success);
    assert!(response.content.starts_with("All checks passed!"));
    assert!(response.content.contains("## cargo test --features rt"));
    assert_eq!(
        *runner.calls.borrow(),
        vec!["cargo check", "cargo test", "cargo test --features rt"]
    );
    assert!(runner.saw_manifest.borrow().iter().all(|seen| *seen));

    let entry = response
        .ledger_update
        .get(&ValidationKind::BuildAndTest)
        .expect("build-and-test recorded");
    assert_eq!(entry.fingerprint, state_fingerprint(&materializer, &state));
    assert_eq!(response.ledger_update.len(), 1);

    let commands: Vec<(String, bool)> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AuditEvent::CheckResult { command, passed } => Some((command.clone(), *passed)),
            _ => None,
        })
        .collect();
    assert_eq!(commands.len(), 3);
    assert!(commands.iter().all(|(_, passed)| *passed));
}

#[test]
fn failing_test_stage_leaves_ledger_untouched() {
    let config = GateConfig::default();
    let materializer = TempDirMaterializer::new();
    let runner = StubBuildTool::failing(&["cargo test"]);
    let mut sink = MemorySink::default();

    let response = {
        let mut ctx = ToolContext {
            config: &config,
            materializer: &materializer,
            runner: &runner,
            sink: &mut sink,
        };
        run_quick_tests(&mut ctx, &project(), &["rt".to_string()], true)
    };

    assert!(!response.success);
    assert!(
        response
            .content
            .starts_with("Some checks failed. Fix the issues before running the prover.")
    );
    assert!(response.content.contains("**Status**: FAILED"));
    assert!(response.content.contains("cargo test blew up"));
    assert!(response.ledger_update.is_empty());
    assert_eq!(*runner.calls.borrow(), vec!["cargo check", "cargo test"]);
}

#[test]
fn missing_manifest_is_reported_before_any_spawn() {
    let config = GateConfig::default();
    let materializer = TempDirMaterializer::new();
    let runner = StubBuildTool::default();
    let mut sink = MemorySink::default();
    let state = WorkspaceState::new().with_file("src/lib.rs", "pub fn f() {}\n");

    let response = {
        let mut ctx = ToolContext {
            config: &config,
            materializer: &materializer,
            runner: &runner,
            sink: &mut sink,
        };
        run_quick_tests(&mut ctx, &state, &[], true)
    };

    assert!(!response.success);
    assert!(response.content.starts_with("Error: Cargo.toml not found"));
    assert!(runner.calls.borrow().is_empty());
    assert!(sink.events.is_empty());
}

#[test]
fn materialized_directory_is_removed_after_the_run() {
    let config = GateConfig::default();
    let materializer = TempDirMaterializer::new();
    let runner = StubBuildTool::default();
    let mut sink = MemorySink::default();

    {
        let mut ctx = ToolContext {
            config: &config,
            materializer: &materializer,
            runner: &runner,
            sink: &mut sink,
        };
        run_quick_tests(&mut ctx, &project(), &[], false);
    }

    let cwd = runner.cwd.borrow().clone().expect("runner was called");
    assert!(!cwd.exists(), "{} should be gone", cwd.display());
}

#[test]
fn checks_run_even_when_solana_prerequisites_are_missing() {
    let config = GateConfig {
        mode: DeploymentMode::Solana,
        ..GateConfig::default()
    };
    let materializer = TempDirMaterializer::new();
    let runner = StubBuildTool::default();
    let mut sink = MemorySink::default();

    let response = {
        let mut ctx = ToolContext {
            config: &config,
            materializer: &materializer,
            runner: &runner,
            sink: &mut sink,
        };
        run_quick_tests(&mut ctx, &project(), &[], false)
    };

    assert!(response.success);
    assert_eq!(*runner.calls.borrow(), vec!["cargo check"]);
}
