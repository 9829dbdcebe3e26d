//! Multi-stage build/test checks ahead of the prover.
//!
//! Stage order is fixed: `check`, then `test` (if requested), then one
//! `test --features <flag>` per flag. A failed `check` or `test` stops the
//! sequence. Feature stages run independently of each other once `test`
//! passed; any failure among them still fails the whole run.

use crate::core::process::{CommandRunner, Invocation, ProcessError, combine_output};
use std::path::Path;
use std::time::Duration;

/// Outputs shorter than this are shown in full even when the stage passed.
pub const FULL_OUTPUT_THRESHOLD: usize = 2000;
/// Hard cap on any output block.
pub const OUTPUT_CAP: usize = 4000;
/// Preview length for long, passing outputs.
pub const PASSING_PREVIEW: usize = 500;
pub const TRUNCATION_MARKER: &str = "...(truncated)";

#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub tool: String,
    pub capture_output: bool,
    pub timeout: Option<Duration>,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            tool: "cargo".to_string(),
            capture_output: true,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub command: String,
    pub passed: bool,
    pub output: String,
}

#[derive(Debug, Clone)]
pub struct CheckRun {
    pub all_passed: bool,
    pub report: String,
    pub stages: Vec<StageResult>,
}

fn run_stage(
    runner: &dyn CommandRunner,
    workspace_dir: &Path,
    options: &CheckOptions,
    args: &[&str],
) -> StageResult {
    let invocation = Invocation::new(options.tool.as_str(), workspace_dir)
        .args(args.iter().copied())
        .capture_output(options.capture_output)
        .timeout(options.timeout);
    let command = invocation.command_line();

    let (passed, output) = match runner.run(&invocation) {
        Ok(outcome) => (true, outcome.combined()),
        Err(ProcessError::NonZeroExit { stdout, stderr, .. }) => {
            (false, combine_output(&stdout, &stderr))
        }
        Err(ProcessError::ToolNotInstalled { hint, .. }) => (false, hint),
        Err(e @ ProcessError::TimedOut { .. }) => {
            let note = e.to_string();
            let captured = match &e {
                ProcessError::TimedOut { stdout, stderr, .. } => combine_output(stdout, stderr),
                _ => String::new(),
            };
            (false, combine_output(&captured, &note))
        }
        Err(e @ ProcessError::Launch { .. }) => (false, e.to_string()),
    };

    StageResult {
        command,
        passed,
        output,
    }
}

/// Run the stage sequence in `workspace_dir` and build the report.
pub fn run_checks(
    runner: &dyn CommandRunner,
    workspace_dir: &Path,
    features: &[String],
    run_tests: bool,
    options: &CheckOptions,
) -> CheckRun {
    let mut stages = Vec::new();

    let check = run_stage(runner, workspace_dir, options, &["check"]);
    let check_passed = check.passed;
    stages.push(check);

    if check_passed && run_tests {
        let test = run_stage(runner, workspace_dir, options, &["test"]);
        let test_passed = test.passed;
        stages.push(test);

        if test_passed {
            for feature in features {
                stages.push(run_stage(
                    runner,
                    workspace_dir,
                    options,
                    &["test", "--features", feature.as_str()],
                ));
            }
        }
    }

    let all_passed = stages.iter().all(|s| s.passed);
    let report = render_check_report(&stages);
    CheckRun {
        all_passed,
        report,
        stages,
    }
}

fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Output block for one stage under the inclusion policy.
pub fn bounded_output(passed: bool, output: &str) -> String {
    if !passed || output.chars().count() < FULL_OUTPUT_THRESHOLD {
        take_chars(output, OUTPUT_CAP).to_string()
    } else {
        format!("{}{}", take_chars(output, PASSING_PREVIEW), TRUNCATION_MARKER)
    }
}

pub fn render_check_report(stages: &[StageResult]) -> String {
    let mut lines = Vec::with_capacity(stages.len() * 2);
    for stage in stages {
        let status = if stage.passed { "PASSED" } else { "FAILED" };
        lines.push(format!("## {}\n**Status**: {}\n", stage.command, status));
        lines.push(format!(
            "```\n{}\n```\n",
            bounded_output(stage.passed, &stage.output)
        ));
    }
    lines.join("\n")
}
