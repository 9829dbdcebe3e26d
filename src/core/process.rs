//! External process invocation against a materialized workspace.
//!
//! The runner never owns the working directory; it only executes inside it.
//! Failures are classified so callers can branch on them:
//! - `ToolNotInstalled`: preflight PATH lookup failed, or the launch itself
//!   reported "not found"
//! - `NonZeroExit`: the tool ran and failed; captured output travels with it
//! - `TimedOut`: only when a timeout was configured (default: wait forever)

use std::env;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("{hint}")]
    ToolNotInstalled { binary: String, hint: String },
    #[error("{program} exited with non-zero status {code}")]
    NonZeroExit {
        program: String,
        code: i32,
        stdout: String,
        stderr: String,
    },
    #[error("{program} did not finish within {}s and was killed", .limit.as_secs())]
    TimedOut {
        program: String,
        limit: Duration,
        stdout: String,
        stderr: String,
    },
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl ProcessError {
    pub fn not_installed(binary: &str) -> Self {
        ProcessError::ToolNotInstalled {
            binary: binary.to_string(),
            hint: remediation_hint(binary),
        }
    }
}

/// Remediation text for a missing executable.
pub fn remediation_hint(binary: &str) -> String {
    format!(
        "{bin} was not found on PATH. Install {bin} and ensure the executable is available in your environment. Check with: `which {bin}`.",
        bin = binary
    )
}

/// Result of one successful invocation. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutcome {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutcome {
    /// stdout followed by stderr, newline-separated when both are present.
    pub fn combined(&self) -> String {
        combine_output(&self.stdout, &self.stderr)
    }
}

pub fn combine_output(stdout: &str, stderr: &str) -> String {
    match (stdout.is_empty(), stderr.is_empty()) {
        (true, _) => stderr.to_string(),
        (false, true) => stdout.to_string(),
        (false, false) => format!("{}\n{}", stdout, stderr),
    }
}

/// One command to execute.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub capture_output: bool,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: &Path) -> Self {
        Invocation {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            capture_output: true,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The literal command line, as shown in reports.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Full argv including the program.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Seam for executing invocations; the system implementation spawns real processes.
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutcome, ProcessError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutcome, ProcessError> {
        run(invocation)
    }
}

/// Locate an executable the way a shell would: paths are checked directly,
/// bare names are searched on `PATH`.
pub fn locate_binary(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|full| is_executable(full))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Execute `invocation` and classify the outcome.
pub fn run(invocation: &Invocation) -> Result<ProcessOutcome, ProcessError> {
    if locate_binary(&invocation.program).is_none() {
        return Err(ProcessError::not_installed(&invocation.program));
    }

    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .current_dir(&invocation.cwd)
        .stdin(Stdio::null());
    if invocation.capture_output {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    } else {
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
    }

    let child = cmd.spawn().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ProcessError::not_installed(&invocation.program),
        _ => ProcessError::Launch {
            program: invocation.program.clone(),
            source: e,
        },
    })?;

    let launch_err = |source: io::Error| ProcessError::Launch {
        program: invocation.program.clone(),
        source,
    };

    let (status, stdout, stderr) = match invocation.timeout {
        None => {
            let output = child.wait_with_output().map_err(launch_err)?;
            (Some(output.status), output.stdout, output.stderr)
        }
        Some(limit) => wait_with_timeout(child, limit).map_err(launch_err)?,
    };

    let stdout = String::from_utf8_lossy(&stdout).to_string();
    let stderr = String::from_utf8_lossy(&stderr).to_string();

    let Some(status) = status else {
        return Err(ProcessError::TimedOut {
            program: invocation.program.clone(),
            limit: invocation.timeout.unwrap_or_default(),
            stdout,
            stderr,
        });
    };

    let exit_code = status.code().unwrap_or(-1);
    if exit_code != 0 {
        return Err(ProcessError::NonZeroExit {
            program: invocation.program.clone(),
            code: exit_code,
            stdout,
            stderr,
        });
    }

    Ok(ProcessOutcome {
        exit_code,
        stdout,
        stderr,
    })
}

/// How long to keep collecting output after the child is gone. Grandchildren
/// that inherited the pipes can hold them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Wait for `child` up to `limit`; kills it on expiry and returns `None` status.
///
/// Pipes are drained on their own threads so a chatty child cannot block on a
/// full pipe while we poll. Output is collected until the pipes close or the
/// deadline passes, whichever comes first; readers still blocked on a pipe
/// held by a grandchild are abandoned.
fn wait_with_timeout(
    mut child: Child,
    limit: Duration,
) -> io::Result<(Option<ExitStatus>, Vec<u8>, Vec<u8>)> {
    let stdout_rx = child.stdout.take().map(spawn_reader);
    let stderr_rx = child.stderr.take().map(spawn_reader);

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if started.elapsed() >= limit {
            let _ = child.kill();
            let _ = child.wait();
            break None;
        }
        thread::sleep(POLL_INTERVAL);
    };

    let now = Instant::now();
    let deadline = match status {
        Some(_) => (started + limit).max(now) + DRAIN_GRACE,
        None => now + DRAIN_GRACE,
    };
    let stdout = stdout_rx.map(|rx| drain(&rx, deadline)).unwrap_or_default();
    let stderr = stderr_rx.map(|rx| drain(&rx, deadline)).unwrap_or_default();
    Ok((status, stdout, stderr))
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(chunk[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

/// Everything received before the sender hangs up or `deadline` passes.
fn drain(rx: &Receiver<Vec<u8>>, deadline: Instant) -> Vec<u8> {
    let mut buf = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(chunk) => buf.extend_from_slice(&chunk),
            Err(_) => break,
        }
    }
    buf
}
