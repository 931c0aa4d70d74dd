//! Command runner - the only place that spawns processes
//!
//! `TokioRunner` runs a [`CommandSpec`] with piped stdio, streams stdout lines
//! to the progress bus, collects stderr, and kills the child on timeout.
//! `FakeRunner` replays canned outputs and counts calls for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::commands::CommandSpec;
use crate::progress_bus::ProgressBus;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} failed with exit code {code}: {stderr}")]
    Failed {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("error reading output of {program}: {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },
}

impl ExecError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecError::Timeout { .. })
    }
}

/// Captured output of a successful run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stdout_truncated: bool,
    pub stderr: String,
    pub duration_ms: u64,
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run one command to completion. Non-zero exit is an error.
    async fn run(&self, spec: &CommandSpec, operation_id: Uuid) -> Result<CommandOutput, ExecError>;
}

/// Truncate to at most `max` bytes, on a char boundary
fn truncate_output(mut text: String, max: usize) -> (String, bool) {
    if text.len() <= max {
        return (text, false);
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    (text, true)
}

/// Error text for a non-zero exit: stderr, or stdout when stderr is empty
fn failure_text(stdout: &str, stderr: &str) -> String {
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = stdout.trim();
    if stdout.is_empty() {
        "no output".to_string()
    } else {
        stdout.to_string()
    }
}

/// Real runner on tokio processes
#[derive(Debug, Clone, Default)]
pub struct TokioRunner {
    bus: Option<ProgressBus>,
}

impl TokioRunner {
    pub fn new() -> Self {
        Self { bus: None }
    }

    pub fn with_progress(bus: ProgressBus) -> Self {
        Self { bus: Some(bus) }
    }
}

#[async_trait]
impl CommandRunner for TokioRunner {
    async fn run(&self, spec: &CommandSpec, operation_id: Uuid) -> Result<CommandOutput, ExecError> {
        let start = Instant::now();
        let command_line = spec.command_line();
        info!("Executing: {}", command_line);

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buf).await;
            }
            String::from_utf8_lossy(&buf).into_owned()
        });

        let bus = self.bus.clone();
        let max_output = spec.max_output;
        let collect = async {
            let mut collected = String::new();
            if let Some(stdout) = stdout {
                // Lines are decoded lossily: build logs may carry non-UTF-8 bytes
                let mut segments = BufReader::new(stdout).split(b'\n');
                while let Some(mut raw) = segments.next_segment().await? {
                    if raw.last() == Some(&b'\r') {
                        raw.pop();
                    }
                    let line = String::from_utf8_lossy(&raw);
                    if let Some(bus) = &bus {
                        bus.output_line(operation_id, line.to_string());
                    }
                    if collected.len() <= max_output {
                        collected.push_str(&line);
                        collected.push('\n');
                    }
                }
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((collected, status))
        };

        let waited = tokio::time::timeout(spec.timeout, collect).await;
        let (stdout, status) = match waited {
            Ok(Ok(done)) => done,
            Ok(Err(source)) => {
                stderr_task.abort();
                return Err(ExecError::Io {
                    program: spec.program.clone(),
                    source,
                });
            }
            Err(_) => {
                warn!("{} timed out after {:?}, killing", command_line, spec.timeout);
                let _ = child.kill().await;
                stderr_task.abort();
                return Err(ExecError::Timeout {
                    program: spec.program.clone(),
                    secs: spec.timeout.as_secs().max(1),
                });
            }
        };

        let stderr = stderr_task.await.unwrap_or_default();
        let (stdout, stdout_truncated) = truncate_output(stdout, spec.max_output);
        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = status.code().unwrap_or(-1);
        debug!("{} exited with {} in {}ms", command_line, exit_code, duration_ms);

        if !status.success() {
            return Err(ExecError::Failed {
                program: spec.program.clone(),
                code: exit_code,
                stderr: failure_text(&stdout, &stderr),
            });
        }

        Ok(CommandOutput {
            command: command_line,
            exit_code,
            stdout,
            stdout_truncated,
            stderr,
            duration_ms,
        })
    }
}

// ============================================================================
// Fake runner (testing)
// ============================================================================

/// Canned outcome for one program
#[derive(Debug, Clone)]
pub enum FakeResponse {
    Ok { stdout: String },
    Fail { code: i32, stderr: String },
    Timeout,
    NotFound,
}

impl FakeResponse {
    pub fn ok(stdout: &str) -> Self {
        Self::Ok {
            stdout: stdout.to_string(),
        }
    }

    pub fn fail(code: i32, stderr: &str) -> Self {
        Self::Fail {
            code,
            stderr: stderr.to_string(),
        }
    }
}

/// Replays canned responses keyed by program name (the program after any
/// `sudo`). Unconfigured programs succeed with empty output. Stdout is
/// capped like the real runner does.
#[derive(Debug, Default)]
pub struct FakeRunner {
    responses: HashMap<String, FakeResponse>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, program: &str, response: FakeResponse) -> Self {
        self.responses.insert(program.to_string(), response);
        self
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Command lines run so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Highest number of overlapping calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn key(spec: &CommandSpec) -> &str {
        if spec.program == "sudo" {
            spec.args.first().map(String::as_str).unwrap_or("sudo")
        } else {
            &spec.program
        }
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec, _operation_id: Uuid) -> Result<CommandOutput, ExecError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(spec.command_line());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let program = Self::key(spec).to_string();
        match self.responses.get(&program).cloned() {
            None => Ok(CommandOutput {
                command: spec.command_line(),
                ..Default::default()
            }),
            Some(FakeResponse::Ok { stdout }) => {
                let (stdout, stdout_truncated) = truncate_output(stdout, spec.max_output);
                Ok(CommandOutput {
                    command: spec.command_line(),
                    stdout,
                    stdout_truncated,
                    ..Default::default()
                })
            }
            Some(FakeResponse::Fail { code, stderr }) => Err(ExecError::Failed {
                program,
                code,
                stderr,
            }),
            Some(FakeResponse::Timeout) => Err(ExecError::Timeout {
                program,
                secs: spec.timeout.as_secs(),
            }),
            Some(FakeResponse::NotFound) => Err(ExecError::Spawn {
                program,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{DISPLAY_OUTPUT_BYTES, PARSED_OUTPUT_BYTES};
    use luminous_shared::ProgressEvent;
    use std::sync::Arc;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", ["-c", script]).with_timeout(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let out = TokioRunner::new().run(&sh("echo one; echo two"), Uuid::new_v4()).await.unwrap();
        assert_eq!(out.stdout, "one\ntwo\n");
        assert_eq!(out.exit_code, 0);
        assert!(!out.stdout_truncated);
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let err = TokioRunner::new()
            .run(&sh("echo 'error: permission denied' >&2; exit 3"), Uuid::new_v4())
            .await
            .unwrap_err();
        match err {
            ExecError::Failed { code, stderr, .. } => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "error: permission denied");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills() {
        let spec = sh("sleep 5").with_timeout(Duration::from_millis(200));
        let start = Instant::now();
        let err = TokioRunner::new().run(&spec, Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("timed out after 1s"));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let spec = CommandSpec::new("luminous-no-such-binary", Vec::<String>::new());
        let err = TokioRunner::new().run(&spec, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_streams_lines_to_bus() {
        let bus = ProgressBus::default();
        let seen = Arc::new(Mutex::new(Vec::<ProgressEvent>::new()));
        let sink = Arc::clone(&seen);
        bus.register_callback(move |e| sink.lock().unwrap().push(e.clone()));

        let id = Uuid::new_v4();
        TokioRunner::with_progress(bus)
            .run(&sh("echo building; echo done"), id)
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|e| e.is_indeterminate() && e.operation_id == id));
        assert_eq!(seen[0].message, "building");
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        let text = "é".repeat(DISPLAY_OUTPUT_BYTES);
        let (cut, truncated) = truncate_output(text, DISPLAY_OUTPUT_BYTES);
        assert!(truncated);
        assert!(cut.len() <= DISPLAY_OUTPUT_BYTES);
    }

    /// A single 200 KiB line, like `nix search --json` for a common term
    const LONG_LINE: &str = "head -c 204800 /dev/zero | tr '\\0' a; echo";

    #[tokio::test]
    async fn test_display_output_is_capped() {
        let out = TokioRunner::new().run(&sh(LONG_LINE), Uuid::new_v4()).await.unwrap();
        assert!(out.stdout_truncated);
        assert_eq!(out.stdout.len(), DISPLAY_OUTPUT_BYTES);
    }

    #[tokio::test]
    async fn test_parsed_output_is_kept_whole() {
        let spec = sh(LONG_LINE).parsed_output();
        assert_eq!(spec.max_output, PARSED_OUTPUT_BYTES);
        let out = TokioRunner::new().run(&spec, Uuid::new_v4()).await.unwrap();
        assert!(!out.stdout_truncated);
        assert_eq!(out.stdout.trim_end().len(), 204800);
    }

    #[tokio::test]
    async fn test_non_utf8_stdout_is_decoded_lossily() {
        let out = TokioRunner::new()
            .run(&sh("printf 'building \\377\\n'; printf 'done\\r\\n'"), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(out.stdout, "building \u{FFFD}\ndone\n");
    }

    #[tokio::test]
    async fn test_fake_runner_keys_past_sudo() {
        let fake = FakeRunner::new().respond("nixos-rebuild", FakeResponse::fail(1, "permission denied"));
        let spec = CommandSpec::new("nixos-rebuild", ["switch", "--rollback"]).with_sudo(true);
        let err = fake.run(&spec, Uuid::new_v4()).await.unwrap_err();
        assert!(err.to_string().contains("permission denied"));
        assert_eq!(fake.calls(), vec!["sudo nixos-rebuild switch --rollback"]);
    }
}
