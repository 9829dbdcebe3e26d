//! CLI struct definitions for the provergate command-line interface.
//!
//! All clap-derived types live here. Dispatch lives in `lib.rs`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "provergate",
    version = env!("CARGO_PKG_VERSION"),
    about = "Gate expensive formal-verification runs behind fresh build/test checks and report per-rule verdicts."
)]
pub(crate) struct Cli {
    /// Workspace root (defaults to the current working directory).
    #[clap(long, global = true)]
    pub dir: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Print the fingerprint of the workspace content
    Digest(FormatArgs),
    /// Ask the gate whether an operation may run now
    Gate(GateCli),
    /// Run build check, unit tests and feature tests
    Check(CheckCli),
    /// Run the verification engine for one rule
    Prove(ProveCli),
    /// Classify saved engine output for a rule
    Parse(ParseCli),
    /// Inspect or merge the validation ledger
    Ledger(LedgerCli),
    /// Print the subsystem schema (config, events, storage)
    Schema,
}

#[derive(clap::Args, Debug)]
pub(crate) struct FormatArgs {
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OperationArg {
    Prove,
    Check,
    Deliver,
}

#[derive(clap::Args, Debug)]
pub(crate) struct GateCli {
    /// Operation to evaluate.
    #[clap(long, value_enum, default_value = "prove")]
    pub operation: OperationArg,
    /// Rule name, for the prove operation.
    #[clap(long, default_value = "*")]
    pub rule: String,
    #[clap(flatten)]
    pub format: FormatArgs,
}

#[derive(clap::Args, Debug)]
pub(crate) struct RunOverrides {
    /// Keep the materialized workspace directory for inspection.
    #[clap(long)]
    pub keep_folder: bool,
    /// Kill external tools after this many seconds.
    #[clap(long)]
    pub timeout_secs: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct CheckCli {
    /// Feature to run `test --features <F>` with (repeatable).
    #[clap(long = "feature", value_name = "F")]
    pub features: Vec<String>,
    /// Only run the build check.
    #[clap(long)]
    pub no_tests: bool,
    #[clap(flatten)]
    pub overrides: RunOverrides,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ProveCli {
    /// Rule to verify.
    #[clap(long)]
    pub rule: String,
    /// Identifier attached to per-rule audit events (generated when omitted).
    #[clap(long)]
    pub tool_id: Option<String>,
    #[clap(flatten)]
    pub overrides: RunOverrides,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ParseCli {
    /// Rule to classify.
    #[clap(long)]
    pub rule: String,
    /// File holding engine output (stdin when omitted).
    #[clap(long)]
    pub file: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct LedgerCli {
    #[clap(subcommand)]
    pub command: LedgerCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum LedgerCommand {
    /// Show recorded validations and whether they are fresh
    Show(FormatArgs),
    /// Merge entries from a JSON file ({kind: {fingerprint, recorded_at}})
    Merge {
        #[clap(long)]
        from: PathBuf,
    },
}
