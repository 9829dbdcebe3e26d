use provergate::core::audit::{AuditEvent, MemorySink};
use provergate::core::config::{DeploymentMode, GateConfig};
use provergate::core::ledger::ValidationKind;
use provergate::core::process::{
    CommandRunner, Invocation, ProcessError, ProcessOutcome, SystemRunner,
};
use provergate::core::verdict::VerdictStatus;
use provergate::core::workspace::{TempDirMaterializer, WorkspaceState, state_fingerprint};
use provergate::plugins::prover::run_prover;
use provergate::plugins::{ToolContext, ToolResponse};
use std::cell::RefCell;
use std::time::Duration;

const RULE: &str = "rule_vault_solvency_deposit";

enum Reply {
    Stdout(&'static str),
    Missing,
    Fails,
    TimesOut,
}

struct StubEngine {
    reply: Reply,
    argv: RefCell<Vec<Vec<String>>>,
    captured: RefCell<Vec<bool>>,
}

impl StubEngine {
    fn new(reply: Reply) -> Self {
        StubEngine {
            reply,
            argv: RefCell::new(Vec::new()),
            captured: RefCell::new(Vec::new()),
        }
    }
}

impl CommandRunner for StubEngine {
    fn run(&self, inv: &Invocation) -> Result<ProcessOutcome, ProcessError> {
        self.argv.borrow_mut().push(inv.argv());
        self.captured.borrow_mut().push(inv.capture_output);
        match self.reply {
            Reply::Stdout(out) => Ok(ProcessOutcome {
                exit_code: 0,
                stdout: out.to_string(),
                stderr: String::new(),
            }),
            Reply::Missing => Err(ProcessError::not_installed(&inv.program)),
            Reply::Fails => Err(ProcessError::NonZeroExit {
                program: inv.program.clone(),
                code: 2,
                stdout: "partial".to_string(),
                stderr: "license expired".to_string(),
            }),
            Reply::TimesOut => Err(ProcessError::TimedOut {
                program: inv.program.clone(),
                limit: Duration::from_secs(5),
                stdout: String::new(),
                stderr: String::new(),
            }),
        }
    }
}

fn project() -> WorkspaceState {
    WorkspaceState::new()
        .with_file("Cargo.toml", "[package]\nname = \"vault\"\n")
        .with_file("src/lib.rs", "pub fn deposit(a: u64) -> u64 { a }\n")
}

fn prove(
    config: &GateConfig,
    state: &WorkspaceState,
    runner: &StubEngine,
    sink: &mut MemorySink,
) -> ToolResponse {
    let materializer = TempDirMaterializer::new();
    let mut ctx = ToolContext {
        config,
        materializer: &materializer,
        runner,
        sink,
    };
    run_prover(&mut ctx, state, RULE, "tool-1")
}

fn event_types(sink: &MemorySink) -> Vec<&'static str> {
    sink.events
        .iter()
        .map(|e| match e {
            AuditEvent::ProverRun { .. } => "prover_run",
            AuditEvent::RuleResult { .. } => "rule_result",
            AuditEvent::ProverResult { .. } => "prover_result",
            AuditEvent::CheckResult { .. } => "check_result",
        })
        .collect()
}

#[test]
fn verified_rule_records_formal_verification() {
    let config = GateConfig::default();
    let state = project();
    let runner = StubEngine::new(Reply::Stdout(
        "Running rule_vault_solvency_deposit\nrule_vault_solvency_deposit: VERIFIED\n",
    ));
    let mut sink = MemorySink::default();

    let response = prove(&config, &state, &runner, &mut sink);

    assert!(response.success);
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].status, VerdictStatus::Verified);
    assert!(response.content.contains("(1/1 rules verified)"));
    assert!(response.content.contains("**Status**: VERIFIED"));

    let entry = response
        .ledger_update
        .get(&ValidationKind::FormalVerification)
        .expect("formal-verification recorded");
    assert_eq!(
        entry.fingerprint,
        state_fingerprint(&TempDirMaterializer::new(), &state)
    );

    assert_eq!(
        event_types(&sink),
        vec!["prover_run", "rule_result", "prover_result"]
    );
    match &sink.events[1] {
        AuditEvent::RuleResult {
            rule,
            status,
            tool_id,
            ..
        } => {
            assert_eq!(rule, RULE);
            assert_eq!(*status, VerdictStatus::Verified);
            assert_eq!(tool_id, "tool-1");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn violated_rule_reports_without_ledger_update() {
    let config = GateConfig::default();
    let runner = StubEngine::new(Reply::Stdout("rule_vault_solvency_deposit - FAILED\n"));
    let mut sink = MemorySink::default();

    let response = prove(&config, &project(), &runner, &mut sink);

    assert!(!response.success);
    assert_eq!(response.results[0].status, VerdictStatus::Violated);
    assert!(response.content.contains("(0/1 rules verified)"));
    assert!(response.ledger_update.is_empty());
    match sink.events.last() {
        Some(AuditEvent::ProverResult { status }) => {
            assert_eq!(status.get(RULE), Some(&VerdictStatus::Violated));
        }
        other => panic!("unexpected last event {:?}", other),
    }
}

#[test]
fn command_line_carries_rule_tuning_flags_and_sanity_level() {
    let config = GateConfig::default();
    let runner = StubEngine::new(Reply::Stdout("rule_vault_solvency_deposit: VERIFIED"));
    let mut sink = MemorySink::default();

    prove(&config, &project(), &runner, &mut sink);

    let argv = runner.argv.borrow();
    assert_eq!(argv.len(), 1);
    let argv = &argv[0];
    assert_eq!(argv[0], "certoraSolanaProver");
    assert_eq!(argv[1..3], ["--rule".to_string(), RULE.to_string()]);
    assert!(argv.contains(&"--prover_args".to_string()));
    assert_eq!(argv[argv.len() - 2..], ["--rule_sanity".to_string(), "basic".to_string()]);

    match &sink.events[0] {
        AuditEvent::ProverRun { args } => assert_eq!(args, argv),
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn solana_mode_blocks_prover_until_checks_pass() {
    let config = GateConfig {
        mode: DeploymentMode::Solana,
        ..GateConfig::default()
    };
    let runner = StubEngine::new(Reply::Stdout("rule_vault_solvency_deposit: VERIFIED"));
    let mut sink = MemorySink::default();

    let response = prove(&config, &project(), &runner, &mut sink);

    assert!(!response.success);
    assert!(response.content.contains("never validated"));
    assert!(response.content.contains("quick-tests"));
    assert!(runner.argv.borrow().is_empty());
    assert!(sink.events.is_empty());
}

#[test]
fn solana_mode_allows_prover_after_fresh_checks() {
    let config = GateConfig {
        mode: DeploymentMode::Solana,
        ..GateConfig::default()
    };
    let mut state = project();
    let fp = state_fingerprint(&TempDirMaterializer::new(), &state);
    state
        .validation
        .record_success(ValidationKind::BuildAndTest, fp);
    let runner = StubEngine::new(Reply::Stdout("rule_vault_solvency_deposit: VERIFIED"));
    let mut sink = MemorySink::default();

    let response = prove(&config, &state, &runner, &mut sink);
    assert!(response.success, "{}", response.content);
}

#[test]
fn missing_manifest_stops_before_the_engine_starts() {
    let config = GateConfig::default();
    let state = WorkspaceState::new().with_file("src/lib.rs", "pub fn f() {}\n");
    let runner = StubEngine::new(Reply::Stdout("rule_vault_solvency_deposit: VERIFIED"));
    let mut sink = MemorySink::default();

    let response = prove(&config, &state, &runner, &mut sink);

    assert!(!response.success);
    assert!(response.content.starts_with("Error: Cargo.toml not found"));
    assert!(runner.argv.borrow().is_empty());
    assert!(sink.events.is_empty());
}

#[test]
fn missing_engine_becomes_remediation_text() {
    let config = GateConfig::default();
    let runner = StubEngine::new(Reply::Missing);
    let mut sink = MemorySink::default();

    let response = prove(&config, &project(), &runner, &mut sink);

    assert!(!response.success);
    assert!(response.content.starts_with("Error: certoraSolanaProver was not found"));
    assert!(response.content.contains("which certoraSolanaProver"));
    assert!(response.ledger_update.is_empty());
}

#[test]
fn nonzero_exit_carries_code_and_both_streams() {
    let config = GateConfig::default();
    let runner = StubEngine::new(Reply::Fails);
    let mut sink = MemorySink::default();

    let response = prove(&config, &project(), &runner, &mut sink);

    assert!(!response.success);
    assert!(
        response
            .content
            .contains("certoraSolanaProver run exited with non-zero returncode 2.")
    );
    assert!(response.content.contains("Stdout:\npartial"));
    assert!(response.content.contains("Stderr: license expired"));
}

#[test]
fn silent_engine_yields_error_verdict() {
    let config = GateConfig::default();
    let runner = StubEngine::new(Reply::Stdout("   \n"));
    let mut sink = MemorySink::default();

    let response = prove(&config, &project(), &runner, &mut sink);

    assert!(!response.success);
    assert_eq!(response.results[0].status, VerdictStatus::Error);
    assert!(response.content.contains("didn't produce results"));
    assert_eq!(
        event_types(&sink),
        vec!["prover_run", "rule_result", "prover_result"]
    );
}

#[test]
fn timeout_yields_timeout_verdict() {
    let config = GateConfig::default();
    let runner = StubEngine::new(Reply::TimesOut);
    let mut sink = MemorySink::default();

    let response = prove(&config, &project(), &runner, &mut sink);

    assert!(!response.success);
    assert_eq!(response.results[0].status, VerdictStatus::Timeout);
    assert!(response.ledger_update.is_empty());
    assert!(response.content.contains("did not finish within 5s"));
}

#[test]
fn uncaptured_run_uses_configured_verdict_instead_of_error() {
    let mut config = GateConfig::default();
    config.run.capture_output = false;
    let runner = StubEngine::new(Reply::Stdout(""));
    let mut sink = MemorySink::default();

    let response = prove(&config, &project(), &runner, &mut sink);

    assert_eq!(*runner.captured.borrow(), vec![false]);
    assert!(response.success, "{}", response.content);
    assert_eq!(response.results[0].status, VerdictStatus::Verified);
    assert!(
        response
            .ledger_update
            .contains_key(&ValidationKind::FormalVerification)
    );

    config.prover.unmatched_verdict = VerdictStatus::Error;
    let response = prove(&config, &project(), &runner, &mut sink);
    assert!(!response.success);
    assert_eq!(response.results[0].status, VerdictStatus::Error);
    assert!(response.ledger_update.is_empty());
}

#[cfg(unix)]
#[test]
fn uncaptured_real_engine_can_record_a_pass() {
    use std::os::unix::fs::PermissionsExt;

    let tools = tempfile::tempdir().expect("tools");
    let engine = tools.path().join("engine");
    std::fs::write(&engine, "#!/bin/sh\necho \"$2: VERIFIED\"\n").expect("write engine");
    std::fs::set_permissions(&engine, std::fs::Permissions::from_mode(0o755))
        .expect("chmod engine");

    let mut config = GateConfig::default();
    config.run.capture_output = false;
    config.prover.binary = engine.to_string_lossy().to_string();
    config.prover.args.clear();

    let materializer = TempDirMaterializer::new();
    let mut sink = MemorySink::default();
    let response = {
        let mut ctx = ToolContext {
            config: &config,
            materializer: &materializer,
            runner: &SystemRunner,
            sink: &mut sink,
        };
        run_prover(&mut ctx, &project(), RULE, "tool-1")
    };

    assert!(response.success, "{}", response.content);
    assert_eq!(response.results[0].status, VerdictStatus::Verified);
}
