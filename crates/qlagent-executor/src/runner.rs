//! Command runner: supervises one external process invocation.
//!
//! Output is forwarded line-by-line as it arrives so an operator sees live
//! progress during long engine runs. The error stream is matched against a
//! pluggable set of fatal markers; a hit kills the child and surfaces
//! [`RunnerError::FatalMarker`], which callers treat as a whole-run abort.
//! Every other non-zero exit is a warning returned to the caller, since the
//! engine reports recoverable per-file errors through its exit code.

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Errors that can occur while supervising an external process.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Command `{0}` not found. Please install it and try again.")]
    NotInstalled(String),

    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{description} failed: fatal marker `{marker}` in error output: {line}")]
    FatalMarker {
        description: String,
        marker: String,
        line: String,
    },

    #[error("{description} timed out after {timeout_secs} seconds")]
    Timeout {
        description: String,
        timeout_secs: u64,
    },

    #[error("{description} failed: {source}")]
    Io {
        description: String,
        #[source]
        source: std::io::Error,
    },
}

/// Recognized fatal-error substrings in a subprocess's error stream.
#[derive(Debug, Clone)]
pub struct FatalMarkers {
    markers: Vec<String>,
}

impl FatalMarkers {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }

    /// The first marker contained in `line`, if any.
    pub fn matches(&self, line: &str) -> Option<&str> {
        self.markers
            .iter()
            .find(|marker| line.contains(marker.as_str()))
            .map(String::as_str)
    }
}

impl Default for FatalMarkers {
    fn default() -> Self {
        Self {
            markers: vec!["A fatal error occurred".to_string()],
        }
    }
}

/// Configuration for a [`CommandRunner`].
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    pub fatal_markers: FatalMarkers,
    /// Hard cap on one invocation. `None` preserves the historical behavior
    /// of waiting indefinitely on a hung engine.
    pub timeout: Option<Duration>,
}

/// Supervises external tool invocations with streamed output.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    fatal_markers: FatalMarkers,
    timeout: Option<Duration>,
}

impl CommandRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            fatal_markers: config.fatal_markers,
            timeout: config.timeout,
        }
    }

    /// Fail-fast precondition: verify `program` resolves on the system path
    /// before any pipeline starts.
    pub async fn ensure_installed(program: &str) -> Result<(), RunnerError> {
        let status = Command::new("which")
            .arg(program)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(RunnerError::NotInstalled(program.to_string())),
        }
    }

    /// Run `program` with `args`, streaming output, and return its exit code.
    pub async fn run(
        &self,
        program: &str,
        args: &[String],
        description: &str,
    ) -> Result<i32, RunnerError> {
        match self.timeout {
            Some(limit) => timeout(limit, self.run_inner(program, args, description))
                .await
                .map_err(|_| RunnerError::Timeout {
                    description: description.to_string(),
                    timeout_secs: limit.as_secs(),
                })?,
            None => self.run_inner(program, args, description).await,
        }
    }

    async fn run_inner(
        &self,
        program: &str,
        args: &[String],
        description: &str,
    ) -> Result<i32, RunnerError> {
        info!("[{}]: {} {}", description, program, args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // On timeout the supervising future is dropped mid-run; the
            // child must not outlive it.
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RunnerError::NotInstalled(program.to_string())
                } else {
                    RunnerError::Spawn {
                        program: program.to_string(),
                        source: e,
                    }
                }
            })?;

        let stdout = child.stdout.take().ok_or_else(|| RunnerError::Io {
            description: description.to_string(),
            source: std::io::Error::other("failed to capture stdout"),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| RunnerError::Io {
            description: description.to_string(),
            source: std::io::Error::other("failed to capture stderr"),
        })?;

        let stdout_task = {
            let description = description.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("{}: {}", description, line.trim_end());
                }
            })
        };

        let mut err_lines = BufReader::new(stderr).lines();
        while let Some(line) = err_lines.next_line().await.map_err(|e| RunnerError::Io {
            description: description.to_string(),
            source: e,
        })? {
            if let Some(marker) = self.fatal_markers.matches(&line) {
                // The engine's internal state is unrecoverable; stop it now.
                child.kill().await.ok();
                stdout_task.abort();
                return Err(RunnerError::FatalMarker {
                    description: description.to_string(),
                    marker: marker.to_string(),
                    line: line.trim_end().to_string(),
                });
            }
            debug!("{}: {}", description, line.trim_end());
        }

        let status = child.wait().await.map_err(|e| RunnerError::Io {
            description: description.to_string(),
            source: e,
        })?;
        stdout_task.await.ok();

        let exit_code = status.code().unwrap_or(-1);
        if exit_code != 0 {
            warn!(
                "There could be something that went wrong (exit code: {}). Use --verbose for more information.",
                exit_code
            );
        } else {
            debug!("[{}]: Run command succeeded.", description);
        }

        Ok(exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_fatal_markers_matching() {
        let markers = FatalMarkers::default();
        assert_eq!(
            markers.matches("oops: A fatal error occurred here"),
            Some("A fatal error occurred")
        );
        assert_eq!(markers.matches("warning: something minor"), None);

        let custom = FatalMarkers::new(vec!["OOM".to_string(), "panic:".to_string()]);
        assert_eq!(custom.matches("thread panic: boom"), Some("panic:"));
    }

    #[tokio::test]
    async fn test_run_returns_exit_code() {
        let runner = CommandRunner::new(RunnerConfig::default());
        let code = runner.run("sh", &sh("exit 0"), "test").await.unwrap();
        assert_eq!(code, 0);

        let code = runner.run("sh", &sh("exit 3"), "test").await.unwrap();
        assert_eq!(code, 3);
    }

    #[tokio::test]
    async fn test_run_tolerates_stderr_noise() {
        let runner = CommandRunner::new(RunnerConfig::default());
        let code = runner
            .run("sh", &sh("echo 'recoverable error' >&2; exit 0"), "test")
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_fatal_marker_aborts() {
        let runner = CommandRunner::new(RunnerConfig::default());
        let err = runner
            .run(
                "sh",
                &sh("echo 'A fatal error occurred while extracting' >&2; sleep 5"),
                "test",
            )
            .await
            .unwrap_err();
        match err {
            RunnerError::FatalMarker { marker, line, .. } => {
                assert_eq!(marker, "A fatal error occurred");
                assert!(line.contains("while extracting"));
            }
            other => panic!("expected FatalMarker, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout() {
        let runner = CommandRunner::new(RunnerConfig {
            timeout: Some(Duration::from_millis(100)),
            ..RunnerConfig::default()
        });
        let err = runner.run("sh", &sh("sleep 5"), "test").await.unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let dir = tempfile::TempDir::new().unwrap();
        let pidfile = dir.path().join("pid");

        let runner = CommandRunner::new(RunnerConfig {
            timeout: Some(Duration::from_millis(100)),
            ..RunnerConfig::default()
        });
        let script = format!("echo $$ > {}; sleep 30", pidfile.display());
        let err = runner.run("sh", &sh(&script), "test").await.unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { .. }));

        let pid: i32 = std::fs::read_to_string(&pidfile)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        // The kill is delivered asynchronously once the supervising future
        // is dropped; wait for the process to die (or turn zombie until
        // the runtime reaps it).
        for _ in 0..100 {
            match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
                Err(_) => return,
                Ok(stat) => {
                    let state = stat.rsplit(')').next();
                    if state.map_or(false, |s| s.trim_start().starts_with('Z')) {
                        return;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("child {pid} still running after timeout");
    }

    #[tokio::test]
    async fn test_ensure_installed() {
        CommandRunner::ensure_installed("sh").await.unwrap();
        let err = CommandRunner::ensure_installed("qlagent-no-such-binary")
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::NotInstalled(_)));
    }

    #[tokio::test]
    async fn test_missing_program_is_not_installed() {
        let runner = CommandRunner::new(RunnerConfig::default());
        let err = runner
            .run("qlagent-no-such-binary", &[], "test")
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::NotInstalled(_)));
    }
}
