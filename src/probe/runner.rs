//! Probe runner: executes one external command with a deadline
//!
//! Both pipes are drained concurrently so a chatty stderr cannot stall
//! stdout, and whatever arrived before the deadline is kept.

use async_trait::async_trait;
use log::{debug, warn};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use super::types::{ProbeFailure, ProbeResult, ProbeSpec};

/// Default cap on captured bytes per stream
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 100_000;

const CHUNK_SIZE: usize = 8192;

/// Time a timed-out probe gets to exit on SIGTERM before SIGKILL
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Executes probes. Never fails: problems are reported in the result.
#[async_trait]
pub trait ProbeRunner: Send + Sync {
    async fn run(&self, spec: &ProbeSpec) -> ProbeResult;
}

/// Runs probes as child processes
#[derive(Debug, Clone)]
pub struct CommandRunner {
    max_output_bytes: usize,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl CommandRunner {
    /// Create a runner capturing at most `max_output_bytes` per stream
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }

    pub fn max_output_bytes(&self) -> usize {
        self.max_output_bytes
    }
}

/// Bounded output buffer that keeps counting after the cap
struct Capture {
    buf: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl Capture {
    fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
            truncated: false,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        let room = self.limit.saturating_sub(self.buf.len());
        if bytes.len() > room {
            self.truncated = true;
        }
        self.buf.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }

    fn into_string(self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }
}

/// Signal every process in the group led by `pgid` (`kill -SIG -- -pgid`)
#[cfg(unix)]
async fn signal_group(pgid: u32, signal: &str) {
    let status = Command::new("kill")
        .args([format!("-{}", signal), "--".to_string(), format!("-{}", pgid)])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = status {
        debug!("kill -{} -{} failed: {}", signal, pgid, e);
    }
}

/// Stop a timed-out probe and everything it started.
///
/// SIGTERM first so wrappers such as `docker run` can forward it and clean
/// up, then SIGKILL for whatever is left in the group.
async fn terminate(child: &mut Child, pgid: Option<u32>, name: &str) {
    #[cfg(unix)]
    {
        if let Some(pgid) = pgid {
            signal_group(pgid, "TERM").await;
            if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
                debug!("Probe '{}' ignored SIGTERM", name);
            }
            signal_group(pgid, "KILL").await;
        }
    }
    #[cfg(not(unix))]
    let _ = pgid;

    if matches!(child.try_wait(), Ok(None))
        && let Err(e) = child.start_kill()
    {
        debug!("Probe '{}' kill failed: {}", name, e);
    }
    let _ = child.wait().await;
}

/// Read one chunk; closed or missing pipes never resolve
async fn read_chunk<R: AsyncRead + Unpin>(pipe: &mut Option<R>, buf: &mut [u8]) -> usize {
    match pipe {
        Some(reader) => reader.read(buf).await.unwrap_or(0),
        None => std::future::pending().await,
    }
}

#[async_trait]
impl ProbeRunner for CommandRunner {
    async fn run(&self, spec: &ProbeSpec) -> ProbeResult {
        let started = Instant::now();
        let elapsed_ms = |started: Instant| started.elapsed().as_millis() as u64;

        let Some((program, args)) = spec.command.split_first() else {
            warn!("Probe '{}' has an empty command", spec.name);
            return ProbeResult::failed(
                &spec.name,
                ProbeFailure::Spawn {
                    reason: "empty command".to_string(),
                },
            );
        };

        debug!("Probe '{}' starting: {}", spec.name, spec.command_line());

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Probe '{}' failed to start: {}", spec.name, e);
                return ProbeResult::failed(&spec.name, ProbeFailure::Spawn { reason: e.to_string() })
                    .with_duration_ms(elapsed_ms(started));
            }
        };

        let pgid = child.id();
        let mut out_pipe = child.stdout.take();
        let mut err_pipe = child.stderr.take();
        let mut out_chunk = [0u8; CHUNK_SIZE];
        let mut err_chunk = [0u8; CHUNK_SIZE];
        let mut stdout = Capture::new(self.max_output_bytes);
        let mut stderr = Capture::new(self.max_output_bytes);

        let deadline = tokio::time::sleep(Duration::from_millis(spec.timeout_ms));
        tokio::pin!(deadline);

        let mut timed_out = false;
        while out_pipe.is_some() || err_pipe.is_some() {
            tokio::select! {
                n = read_chunk(&mut out_pipe, &mut out_chunk) => {
                    if n == 0 {
                        out_pipe = None;
                    } else {
                        stdout.push(&out_chunk[..n]);
                    }
                }
                n = read_chunk(&mut err_pipe, &mut err_chunk) => {
                    if n == 0 {
                        err_pipe = None;
                    } else {
                        stderr.push(&err_chunk[..n]);
                    }
                }
                _ = &mut deadline => {
                    timed_out = true;
                    break;
                }
            }
        }

        let status = if timed_out {
            None
        } else {
            tokio::select! {
                status = child.wait() => Some(status),
                _ = &mut deadline => None,
            }
        };

        let exit_error = match status {
            None => {
                terminate(&mut child, pgid, &spec.name).await;
                warn!("Probe '{}' timed out after {}ms", spec.name, spec.timeout_ms);
                Some(ProbeFailure::Timeout {
                    after_ms: spec.timeout_ms,
                })
            }
            Some(Ok(status)) if status.success() => None,
            Some(Ok(status)) => Some(ProbeFailure::NonZeroExit { code: status.code() }),
            Some(Err(e)) => Some(ProbeFailure::Spawn { reason: e.to_string() }),
        };

        drop(out_pipe);
        drop(err_pipe);

        let truncated = stdout.truncated || stderr.truncated;
        let duration_ms = elapsed_ms(started);
        match &exit_error {
            None => debug!("Probe '{}' finished in {}ms", spec.name, duration_ms),
            Some(failure) => debug!("Probe '{}' {} after {}ms", spec.name, failure, duration_ms),
        }

        ProbeResult {
            name: spec.name.clone(),
            stdout: stdout.into_string(),
            stderr: stderr.into_string(),
            exit_error,
            duration_ms,
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(name: &str, script: &str) -> ProbeSpec {
        ProbeSpec::new(name, ["sh", "-c", script]).timeout_ms(5_000)
    }

    #[test]
    fn test_capture_limit() {
        let mut capture = Capture::new(4);
        capture.push(b"ab");
        assert!(!capture.truncated);
        capture.push(b"cdef");
        assert!(capture.truncated);
        assert_eq!(capture.into_string(), "abcd");
    }

    #[test]
    fn test_runner_default() {
        assert_eq!(CommandRunner::default().max_output_bytes(), DEFAULT_MAX_OUTPUT_BYTES);
        assert_eq!(CommandRunner::new(10).max_output_bytes(), 10);
    }

    #[tokio::test]
    async fn test_run_echo() {
        let result = CommandRunner::default().run(&sh("echo", "echo hello")).await;
        assert!(result.is_success());
        assert_eq!(result.name, "echo");
        assert_eq!(result.stdout.trim(), "hello");
        assert!(result.stderr.is_empty());
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_run_without_shell() {
        let spec = ProbeSpec::new("direct", ["echo", "a;b"]);
        let result = CommandRunner::default().run(&spec).await;
        assert!(result.is_success());
        assert_eq!(result.stdout.trim(), "a;b");
    }

    #[tokio::test]
    async fn test_run_nonzero_keeps_output() {
        let result = CommandRunner::default()
            .run(&sh("crash", "echo partial; echo oops >&2; exit 3"))
            .await;
        assert_eq!(result.exit_error, Some(ProbeFailure::NonZeroExit { code: Some(3) }));
        assert_eq!(result.stdout.trim(), "partial");
        assert_eq!(result.stderr.trim(), "oops");
        assert!(!result.is_unusable());
    }

    #[tokio::test]
    async fn test_run_timeout_keeps_partial_output() {
        let spec = sh("slow", "echo before; sleep 5; echo after").timeout_ms(300);
        let started = Instant::now();
        let result = CommandRunner::default().run(&spec).await;

        assert!(result.timed_out());
        assert_eq!(result.exit_error, Some(ProbeFailure::Timeout { after_ms: 300 }));
        assert!(result.stdout.contains("before"));
        assert!(!result.stdout.contains("after"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_run_missing_executable() {
        let spec = ProbeSpec::new("ghost", ["nonexistent_command_xyz123"]);
        let result = CommandRunner::default().run(&spec).await;
        assert!(matches!(result.exit_error, Some(ProbeFailure::Spawn { .. })));
        assert!(result.is_unusable());
    }

    #[tokio::test]
    async fn test_run_empty_command() {
        let spec = ProbeSpec::new("empty", Vec::<String>::new());
        let result = CommandRunner::default().run(&spec).await;
        assert_eq!(
            result.exit_error,
            Some(ProbeFailure::Spawn {
                reason: "empty command".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_run_truncates_large_output() {
        let spec = sh(
            "chatty",
            "i=0; while [ $i -lt 200 ]; do echo abcdefghij; i=$((i+1)); done",
        );
        let result = CommandRunner::new(100).run(&spec).await;
        assert!(result.is_success());
        assert!(result.truncated);
        assert_eq!(result.stdout.len(), 100);
    }

    // A zombie counts as gone: its reaping is up to whoever adopted it
    #[cfg(target_os = "linux")]
    fn is_running(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .map(|rest| !rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_stops_grandchildren() {
        let spec = sh("spawner", "sleep 30 & echo $!; wait").timeout_ms(300);
        let result = CommandRunner::default().run(&spec).await;

        assert!(result.timed_out());
        let pid: u32 = result.stdout.trim().parse().unwrap();

        let mut running = true;
        for _ in 0..50 {
            if !is_running(pid) {
                running = false;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!running, "background process {} outlived the timed-out probe", pid);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_ignoring_sigterm_is_killed() {
        let spec = sh("stubborn", "trap '' TERM; echo started; sleep 30").timeout_ms(300);
        let started = Instant::now();
        let result = CommandRunner::default().run(&spec).await;

        assert!(result.timed_out());
        assert!(result.stdout.contains("started"));
        assert!(started.elapsed() < KILL_GRACE + Duration::from_secs(3));
    }
}
