//! Manifest dump execution.
//!
//! The dump tool (by default `swift package dump-package`) runs inside the
//! workspace and prints the manifest as JSON on stdout. Each run holds one
//! slot of the shared [`DumpLimiter`] and is raced against a wall-clock
//! timeout; a run that loses the race is killed.

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use plv_core::config::DEFAULT_TIMEOUT_EXIT_CODE;
use plv_core::{Package, PackageError, ValidatorConfig};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, trace, warn};

use crate::limiter::{DumpLimiter, DumpSlot};
use crate::workspace::Workspace;

#[cfg(unix)]
const SIGKILL: i32 = 9;
#[cfg(unix)]
const SIGTERM: i32 = 15;

/// Turns a workspace into decoded package metadata.
#[async_trait]
pub trait ManifestDumper: Send + Sync {
    async fn dump(&self, workspace: &Workspace) -> Result<Package, PackageError>;
}

/// External command that dumps a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpCommand {
    /// Executable, resolved through `PATH`.
    pub program: String,
    /// Arguments passed verbatim; the workspace is the working directory.
    pub args: Vec<String>,
}

impl DumpCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `swift package dump-package`
    pub fn swift() -> Self {
        Self::new(
            "swift",
            vec!["package".to_string(), "dump-package".to_string()],
        )
    }
}

/// Captured result of a dump process that exited on its own.
#[derive(Debug)]
pub struct DumpOutput {
    /// Exit status as reported by the OS.
    pub status: ExitStatus,
    /// Everything written to stdout; the JSON dump on success.
    pub stdout: Vec<u8>,
    /// Everything written to stderr; carried by `BadDump`.
    pub stderr: Vec<u8>,
}

/// Runs [`DumpCommand`] under a concurrency limit and a timeout.
#[derive(Debug, Clone)]
pub struct DumpRunner {
    command: DumpCommand,
    limiter: DumpLimiter,
    timeout: Duration,
    timeout_exit_code: i32,
}

/// A spawned dump process and the slot it occupies.
///
/// Dropping it requests termination of the process before the slot is
/// released, on every exit path.
struct RunningDump {
    child: Child,
    _slot: DumpSlot,
}

impl Drop for RunningDump {
    fn drop(&mut self) {
        // Fails harmlessly when the process has already been reaped.
        if let Err(e) = self.child.start_kill() {
            trace!(error = %e, "dump process already exited");
        }
    }
}

impl DumpRunner {
    pub fn new(command: DumpCommand, limiter: DumpLimiter, timeout: Duration) -> Self {
        Self {
            command,
            limiter,
            timeout,
            timeout_exit_code: DEFAULT_TIMEOUT_EXIT_CODE,
        }
    }

    pub fn from_config(config: &ValidatorConfig, limiter: DumpLimiter) -> Self {
        Self::new(
            DumpCommand::new(config.dump_program.clone(), config.dump_args.clone()),
            limiter,
            config.dump_timeout(),
        )
        .with_timeout_exit_code(config.timeout_exit_code)
    }

    pub fn with_timeout_exit_code(mut self, code: i32) -> Self {
        self.timeout_exit_code = code;
        self
    }

    /// Spawn the command in `dir` and wait for it, bounded by the timeout.
    ///
    /// `Ok(None)` means the timeout fired and the process was killed.
    pub async fn run_in(&self, dir: &Path) -> Result<Option<DumpOutput>, PackageError> {
        let slot = self
            .limiter
            .acquire()
            .await
            .map_err(|e| PackageError::BadDump(format!("dump limiter unavailable: {e}")))?;
        debug!(in_use = self.limiter.in_use(), dir = %dir.display(), "dump slot acquired");

        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PackageError::BadDump(format!("unable to spawn {}: {e}", self.command.program))
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut running = RunningDump { child, _slot: slot };

        let started = Instant::now();
        let finished = tokio::select! {
            result = collect_output(&mut running.child, stdout, stderr) => Some(result),
            _ = tokio::time::sleep(self.timeout) => None,
        };

        // Kill if still alive, then free the slot.
        drop(running);
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "dump slot released");

        match finished {
            None => {
                warn!(
                    dir = %dir.display(),
                    timeout_secs = self.timeout.as_secs_f64(),
                    "dump timed out, process killed"
                );
                Ok(None)
            }
            Some(Err(e)) => Err(PackageError::BadDump(format!(
                "failed waiting for {}: {e}",
                self.command.program
            ))),
            Some(Ok(output)) => Ok(Some(output)),
        }
    }
}

#[async_trait]
impl ManifestDumper for DumpRunner {
    async fn dump(&self, workspace: &Workspace) -> Result<Package, PackageError> {
        match self.run_in(workspace.path()).await? {
            None => Err(PackageError::DumpTimeout),
            Some(output) => {
                debug!(status = %output.status, stdout_bytes = output.stdout.len(), "dump finished");
                classify_output(&output, self.timeout_exit_code)
            }
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

async fn collect_output<O, E>(
    child: &mut Child,
    stdout: Option<O>,
    stderr: Option<E>,
) -> io::Result<DumpOutput>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let (status, stdout, stderr) =
        tokio::try_join!(child.wait(), read_all(stdout), read_all(stderr))?;
    Ok(DumpOutput {
        status,
        stdout,
        stderr,
    })
}

/// Whether an exit status means the process was stopped for running too long.
pub fn is_timeout_exit(status: &ExitStatus, timeout_exit_code: i32) -> bool {
    if status.code() == Some(timeout_exit_code) {
        return true;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if matches!(status.signal(), Some(SIGTERM) | Some(SIGKILL)) {
            return true;
        }
    }
    false
}

/// Map a finished process onto a package or a classified failure.
pub fn classify_output(output: &DumpOutput, timeout_exit_code: i32) -> Result<Package, PackageError> {
    if !output.status.success() {
        if is_timeout_exit(&output.status, timeout_exit_code) {
            return Err(PackageError::DumpTimeout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(PackageError::BadDump(stderr));
    }
    Package::from_dump(&output.stdout)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    fn output(raw_status: i32, stdout: &str, stderr: &str) -> DumpOutput {
        DumpOutput {
            status: ExitStatus::from_raw(raw_status),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    // Wait-status encoding: exit code in the high byte, signal in the low bits.
    fn exited(code: i32) -> i32 {
        code << 8
    }

    #[test]
    fn test_exit_15_is_timeout_regardless_of_stdout() {
        let out = output(exited(15), r#"{"name":"X","products":[{"name":"X"}]}"#, "");
        assert_eq!(classify_output(&out, 15), Err(PackageError::DumpTimeout));
    }

    #[test]
    fn test_killed_by_signal_is_timeout() {
        assert_eq!(classify_output(&output(SIGKILL, "", ""), 15), Err(PackageError::DumpTimeout));
        assert_eq!(classify_output(&output(SIGTERM, "", ""), 15), Err(PackageError::DumpTimeout));
    }

    #[test]
    fn test_custom_timeout_code() {
        let out = output(exited(124), "", "");
        assert_eq!(classify_output(&out, 124), Err(PackageError::DumpTimeout));
        assert!(matches!(classify_output(&out, 15), Err(PackageError::BadDump(_))));
    }

    #[test]
    fn test_nonzero_exit_captures_stderr() {
        let out = output(exited(1), "", "error: manifest parse error\n");
        assert_eq!(
            classify_output(&out, 15),
            Err(PackageError::BadDump("error: manifest parse error".to_string()))
        );
    }

    #[test]
    fn test_success_with_garbage_is_decoding_error() {
        let out = output(0, "Fetching dependencies...", "");
        assert!(matches!(classify_output(&out, 15), Err(PackageError::DecodingError(_))));
    }

    #[test]
    fn test_success_decodes_package() {
        let out = output(0, r#"{"name":"Lib","products":[{"name":"Lib","targets":["Lib"]}]}"#, "");
        let package = classify_output(&out, 15).unwrap();
        assert_eq!(package.products[0].name, "Lib");
    }
}
