use crate::core::process::ProcessError;
use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProverGateError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    ConfigError(#[from] toml::de::Error),
    #[error("Path error: {0}")]
    PathError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("{0}")]
    Process(#[from] ProcessError),
    #[error(
        "{manifest} not found in project root. The verification engine requires a valid project with {manifest}."
    )]
    MissingManifest { manifest: String },
    #[error(
        "{engine} didn't produce results for rule '{rule}', this is likely a bug you should consult the user about"
    )]
    UnparseableResult { engine: String, rule: String },
    #[error("{0}")]
    StaleValidation(String),
}

impl ProverGateError {
    /// Text handed back across the tool-call boundary in place of a failure.
    pub fn guidance(&self) -> String {
        match self {
            ProverGateError::Process(ProcessError::ToolNotInstalled { hint, .. }) => {
                format!("Error: {}", hint)
            }
            ProverGateError::Process(ProcessError::NonZeroExit {
                program,
                code,
                stdout,
                stderr,
            }) => format!(
                "{} run exited with non-zero returncode {}.\nStdout:\n{}\nStderr: {}",
                program, code, stdout, stderr
            ),
            ProverGateError::MissingManifest { .. } => format!("Error: {}", self),
            other => other.to_string(),
        }
    }
}
