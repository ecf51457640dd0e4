//! Bounded execution of generated programs
//!
//! The final code is persisted to a uniquely named scratch file and run as a
//! child process with a hard wall-clock timeout. The executor is not a
//! security sandbox: the child runs with the operator's privileges. What it
//! does guarantee is bounded time, captured output and scratch-file removal
//! on every exit path.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::utils::sanitize_filename;

use super::SynthesisError;

/// How one execution ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    /// The process ran to completion (any exit code)
    Completed,
    /// The wall-clock limit expired and the process was killed
    TimedOut,
    /// The interpreter could not be launched
    FailedToStart,
}

/// Raw result of running one generated program
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub state: TerminalState,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Runs generated code under a wall-clock bound
pub struct Executor {
    interpreter: String,
    scratch_dir: PathBuf,
}

/// Removes the scratch file when the request ends, however it ends
struct ScratchFile {
    path: PathBuf,
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            // Nothing actionable at this point; the scratch dir is periodically
            // recreated anyway.
            warn!(path = %self.path.display(), "Failed to remove scratch file: {e}");
        }
    }
}

impl Executor {
    pub fn new(interpreter: impl Into<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Write the code to a fresh scratch file and run it.
    ///
    /// Returns `Err` only for infrastructure failures (scratch dir or file
    /// not writable); everything that happens to the child process itself is
    /// reported through `ExecutionOutcome`.
    pub async fn execute(
        &self,
        code: &str,
        timeout: Duration,
    ) -> Result<ExecutionOutcome, SynthesisError> {
        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(SynthesisError::Scratch)?;

        let path = self.scratch_dir.join(scratch_name());
        tokio::fs::write(&path, code)
            .await
            .map_err(SynthesisError::Scratch)?;
        let _guard = ScratchFile { path: path.clone() };

        debug!(path = %path.display(), interpreter = %self.interpreter, "Running generated program");
        let start = Instant::now();

        let spawned = Command::new(&self.interpreter)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout must take the child with it
            .kill_on_drop(true)
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to launch interpreter '{}': {e}", self.interpreter);
                return Ok(ExecutionOutcome {
                    state: TerminalState::FailedToStart,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: format!("failed to launch '{}': {e}", self.interpreter),
                    elapsed: start.elapsed(),
                });
            }
        };

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ExecutionOutcome {
                state: TerminalState::Completed,
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                elapsed: start.elapsed(),
            }),
            Ok(Err(e)) => Ok(ExecutionOutcome {
                state: TerminalState::FailedToStart,
                exit_code: None,
                stdout: String::new(),
                stderr: format!("failed to collect process output: {e}"),
                elapsed: start.elapsed(),
            }),
            Err(_) => {
                warn!(?timeout, "Generated program exceeded its time limit");
                Ok(ExecutionOutcome {
                    state: TerminalState::TimedOut,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    elapsed: start.elapsed(),
                })
            }
        }
    }
}

/// Collision-free scratch file name: timestamp plus a random suffix, so even
/// requests landing on the same millisecond cannot collide.
fn scratch_name() -> String {
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S%3f");
    let suffix = Uuid::new_v4().simple().to_string();
    sanitize_filename(&format!("task_{}_{}.py", stamp, &suffix[..8]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_is_empty(dir: &Path) -> bool {
        match std::fs::read_dir(dir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }

    #[test]
    fn test_scratch_names_unique() {
        let a = scratch_name();
        let b = scratch_name();
        assert_ne!(a, b);
        assert!(a.starts_with("task_"));
        assert!(a.ends_with(".py"));
    }

    // The integration tests use `sh` as the interpreter so the suite does not
    // depend on a python installation.

    #[tokio::test]
    async fn test_completed_with_output() {
        let dir = tempfile::tempdir().unwrap();
        let executor = Executor::new("sh", dir.path());
        let outcome = executor
            .execute("echo 120", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome.state, TerminalState::Completed);
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.stdout.trim(), "120");
        assert!(scratch_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let executor = Executor::new("sh", dir.path());
        let outcome = executor
            .execute("echo bad >&2\nexit 3", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome.state, TerminalState::Completed);
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stderr.trim(), "bad");
        assert!(scratch_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_timeout_kills_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let executor = Executor::new("sh", dir.path());
        let start = Instant::now();
        let outcome = executor
            .execute("sleep 30", Duration::from_millis(300))
            .await
            .unwrap();
        assert_eq!(outcome.state, TerminalState::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(scratch_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_failed_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let executor = Executor::new("/definitely/not/an/interpreter", dir.path());
        let outcome = executor
            .execute("echo hi", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(outcome.state, TerminalState::FailedToStart);
        assert!(outcome.stderr.contains("failed to launch"));
        assert!(scratch_is_empty(dir.path()));
    }
}
