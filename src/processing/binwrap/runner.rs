//! Drives one embedded-binary process from spawn to exit, timeout or kill.
//!
//! A [`ProcessRunner`] owns the run configuration (arguments, environment,
//! timeout, stdin source, stdout sink) and the result of the last run. Each
//! `run` resolves a binary for the host, loads it, spawns it, feeds stdin and
//! drains stdout/stderr concurrently while racing the process against the
//! deadline and the kill switch.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::core::RunnerConfig;
use crate::utils::{ToolError, ToolResult};
use super::loader::ExecutableImage;
use super::source::BinaryRegistry;

/// Stream fed to the child's standard input.
pub type InputStream<'io> = Box<dyn AsyncRead + Send + Unpin + 'io>;

/// Destination for the child's standard output.
pub type OutputSink<'io> = Box<dyn AsyncWrite + Send + Unpin + 'io>;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Exit code 0
    Success,
    /// The process exited unsuccessfully; `code` is `None` when a signal ended it
    Failed { code: Option<i32> },
    /// The deadline passed and the process was killed
    TimedOut { elapsed: Duration },
    /// [`KillHandle::kill`] ended the process
    Killed,
}

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub status: RunStatus,
    /// Captured stdout; empty when a sink was configured
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub elapsed: Duration,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Stdout followed by stderr.
    pub fn combined_output(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.stdout.len() + self.stderr.len());
        out.extend_from_slice(&self.stdout);
        out.extend_from_slice(&self.stderr);
        out
    }

    /// Turns every non-success status into the matching error.
    pub fn check(&self) -> ToolResult<()> {
        match self.status {
            RunStatus::Success => Ok(()),
            RunStatus::Failed { code } => Err(ToolError::NonZeroExit {
                code,
                stderr: self.stderr_lossy().trim().to_string(),
            }),
            RunStatus::TimedOut { elapsed } => Err(ToolError::Timeout {
                elapsed_ms: elapsed.as_millis() as u64,
            }),
            RunStatus::Killed => Err(ToolError::Killed),
        }
    }
}

#[derive(Debug)]
struct InFlight {
    pid: Option<u32>,
    notify: Arc<Notify>,
}

/// Cloneable handle that can kill the process a runner currently has in flight.
///
/// Safe to use from another task while `run` is awaiting. Killing when no
/// process is running does nothing.
#[derive(Debug, Clone, Default)]
pub struct KillHandle {
    slot: Arc<Mutex<Option<InFlight>>>,
}

impl KillHandle {
    /// Signals the in-flight process to terminate. Returns `false` if idle.
    pub fn kill(&self) -> bool {
        match self.lock().as_ref() {
            Some(in_flight) => {
                debug!("Kill requested for pid {:?}", in_flight.pid);
                in_flight.notify.notify_one();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    /// PID of the in-flight process, if any.
    pub fn pid(&self) -> Option<u32> {
        self.lock().as_ref().and_then(|in_flight| in_flight.pid)
    }

    fn arm(&self, pid: Option<u32>) -> Armed {
        let notify = Arc::new(Notify::new());
        *self.lock() = Some(InFlight {
            pid,
            notify: Arc::clone(&notify),
        });
        Armed {
            handle: self.clone(),
            notify,
        }
    }

    fn disarm(&self) {
        self.lock().take();
    }

    fn lock(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clears the kill slot however the run ends, including when its future is dropped.
struct Armed {
    handle: KillHandle,
    notify: Arc<Notify>,
}

impl Drop for Armed {
    fn drop(&mut self) {
        self.handle.disarm();
    }
}

enum Outcome {
    Finished {
        status: io::Result<ExitStatus>,
        fed: io::Result<u64>,
        stdout: io::Result<Vec<u8>>,
        stderr: io::Result<Vec<u8>>,
    },
    TimedOut,
    Killed,
}

/// Runs a binary from a [`BinaryRegistry`] with redirected streams.
///
/// Configuration accumulates until [`reset`](Self::reset). `'io` bounds the
/// borrowed stdin source and stdout sink.
pub struct ProcessRunner<'io> {
    registry: Arc<BinaryRegistry>,
    args: Vec<OsString>,
    env: Option<BTreeMap<OsString, OsString>>,
    stdin: Option<InputStream<'io>>,
    stdout_sink: Option<OutputSink<'io>>,
    timeout: Option<Duration>,
    debug: bool,
    last: Option<RunResult>,
    kill: KillHandle,
}

impl<'io> ProcessRunner<'io> {
    pub fn new(registry: Arc<BinaryRegistry>) -> Self {
        Self {
            registry,
            args: Vec::new(),
            env: None,
            stdin: None,
            stdout_sink: None,
            timeout: None,
            debug: false,
            last: None,
            kill: KillHandle::default(),
        }
    }

    /// Creates a runner with the timeout, debug flag and environment from `config`.
    pub fn with_config(registry: Arc<BinaryRegistry>, config: &RunnerConfig) -> Self {
        let mut runner = Self::new(registry);
        runner.apply_config(config);
        runner
    }

    /// Applies timeout, debug flag and environment override from `config`.
    pub fn apply_config(&mut self, config: &RunnerConfig) -> &mut Self {
        self.timeout = config.timeout();
        self.debug = config.debug;
        if let Some(env) = &config.env {
            self.set_env(env.iter());
        }
        self
    }

    pub fn registry(&self) -> &BinaryRegistry {
        &self.registry
    }

    /// Appends `name` followed by `values` to the argument list.
    pub fn arg<I, S>(&mut self, name: impl AsRef<OsStr>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.push(name.as_ref().to_os_string());
        self.args.extend(values.into_iter().map(|v| v.as_ref().to_os_string()));
        self
    }

    /// Appends a single argument.
    pub fn flag(&mut self, name: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(name.as_ref().to_os_string());
        self
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Bounds the wall-clock time of the next run. Zero means unbounded.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn set_debug(&mut self, debug: bool) -> &mut Self {
        self.debug = debug;
        self
    }

    pub fn set_stdin(&mut self, reader: impl AsyncRead + Send + Unpin + 'io) -> &mut Self {
        self.stdin = Some(Box::new(reader));
        self
    }

    /// Streams stdout to `writer` instead of capturing it. Used by the next run only.
    pub fn set_stdout_sink(&mut self, writer: impl AsyncWrite + Send + Unpin + 'io) -> &mut Self {
        self.stdout_sink = Some(Box::new(writer));
        self
    }

    /// Replaces (not merges with) the inherited environment for the next run.
    pub fn set_env<I, K, V>(&mut self, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(k, v)| (k.as_ref().to_os_string(), v.as_ref().to_os_string()))
                .collect(),
        );
        self
    }

    pub fn env(&self) -> Option<&BTreeMap<OsString, OsString>> {
        self.env.as_ref()
    }

    /// Result of the last run, if it got as far as spawning.
    pub fn last_result(&self) -> Option<&RunResult> {
        self.last.as_ref()
    }

    pub fn take_result(&mut self) -> Option<RunResult> {
        self.last.take()
    }

    /// Captured stdout of the last run.
    pub fn stdout(&self) -> &[u8] {
        self.last.as_ref().map(|r| r.stdout.as_slice()).unwrap_or_default()
    }

    /// Captured stderr of the last run.
    pub fn stderr(&self) -> &[u8] {
        self.last.as_ref().map(|r| r.stderr.as_slice()).unwrap_or_default()
    }

    pub fn kill_handle(&self) -> KillHandle {
        self.kill.clone()
    }

    /// Terminates the in-flight process, if any. No-op when idle.
    pub fn kill(&self) -> bool {
        self.kill.kill()
    }

    pub fn is_running(&self) -> bool {
        self.kill.is_running()
    }

    /// Clears arguments, captured output, streams, environment override and
    /// the process handle. Timeout and debug flag are kept. Idempotent.
    pub fn reset(&mut self) -> &mut Self {
        self.args.clear();
        self.env = None;
        self.stdin = None;
        self.stdout_sink = None;
        self.last = None;
        self.kill.disarm();
        self
    }

    /// Runs the binary with the configured arguments followed by `extra`.
    ///
    /// Configuration, platform, load and spawn problems are errors. Once the
    /// process has started, every ending (including non-zero exit, timeout
    /// and kill) is a [`RunResult`]; use [`RunResult::check`] to turn it into
    /// an error.
    pub async fn run<I, S>(&mut self, extra: I) -> ToolResult<&RunResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.last = None;

        let name = self.registry.name().to_string();
        let source = self.registry.resolve_current()?;
        let image = ExecutableImage::load(source.bytes(), &name)?;

        let mut args = self.args.clone();
        args.extend(extra.into_iter().map(|a| a.as_ref().to_os_string()));

        if self.debug {
            info!("Running {} {}", name, display_args(&args));
        } else {
            debug!("Running {} {}", name, display_args(&args));
        }

        let mut cmd = Command::new(image.path());
        #[cfg(unix)]
        cmd.arg0(&name);
        cmd.args(&args)
            .stdin(if self.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(env) = &self.env {
            cmd.env_clear().envs(env);
        }

        let started = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| ToolError::spawn(format!("Failed to start {}: {}", name, e)))?;
        let armed = self.kill.arm(child.id());
        debug!("{} started with pid {:?}", name, child.id());

        let stdin_pipe = child.stdin.take();
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdin_src = self.stdin.take();
        let mut sink = self.stdout_sink.take();
        let timeout = self.timeout;

        let outcome = {
            let work = async {
                let ((fed, stdout, stderr), status) = tokio::join!(
                    async {
                        tokio::join!(
                            feed_stdin(stdin_src, stdin_pipe),
                            drain_stdout(stdout_pipe, sink.as_mut()),
                            drain_stderr(stderr_pipe),
                        )
                    },
                    child.wait(),
                );
                Outcome::Finished { status, fed, stdout, stderr }
            };
            tokio::pin!(work);

            tokio::select! {
                finished = &mut work => finished,
                _ = deadline(timeout) => Outcome::TimedOut,
                _ = armed.notify.notified() => Outcome::Killed,
            }
        };

        let result = match outcome {
            Outcome::Finished { status, fed, stdout, stderr } => {
                let status = status
                    .map_err(|e| ToolError::io(format!("Failed to wait for {}: {}", name, e)))?;
                fed.map_err(|e| ToolError::io(format!("Failed to feed stdin of {}: {}", name, e)))?;
                let stdout = stdout
                    .map_err(|e| ToolError::io(format!("Failed to read stdout of {}: {}", name, e)))?;
                let stderr = stderr
                    .map_err(|e| ToolError::io(format!("Failed to read stderr of {}: {}", name, e)))?;

                debug!("{} exited with {} after {:?}", name, status, started.elapsed());
                RunResult {
                    status: if status.success() {
                        RunStatus::Success
                    } else {
                        RunStatus::Failed { code: status.code() }
                    },
                    stdout,
                    stderr,
                    elapsed: started.elapsed(),
                }
            }
            Outcome::TimedOut => {
                let elapsed = started.elapsed();
                warn!("{} timed out after {:?}, killing pid {:?}", name, elapsed, child.id());
                terminate(&mut child).await;
                RunResult {
                    status: RunStatus::TimedOut { elapsed },
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                    elapsed,
                }
            }
            Outcome::Killed => {
                debug!("{} killed on request", name);
                terminate(&mut child).await;
                RunResult {
                    status: RunStatus::Killed,
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                    elapsed: started.elapsed(),
                }
            }
        };

        drop(armed);
        image.release();

        Ok(self.last.insert(result))
    }
}

/// Kills the child and reaps it so nothing is left running.
async fn terminate(child: &mut tokio::process::Child) {
    if let Err(e) = child.start_kill() {
        // Already exited between the deadline firing and the kill.
        debug!("start_kill failed: {}", e);
    }
    if let Err(e) = child.wait().await {
        warn!("Failed to reap killed process: {}", e);
    }
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending::<()>().await,
    }
}

async fn feed_stdin(src: Option<InputStream<'_>>, pipe: Option<ChildStdin>) -> io::Result<u64> {
    let (Some(mut src), Some(mut pipe)) = (src, pipe) else {
        return Ok(0);
    };

    let copied = match tokio::io::copy(&mut src, &mut pipe).await {
        Ok(n) => n,
        // The tool may stop reading early (e.g. `-version`).
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            warn!("Child closed stdin before all input was written");
            return Ok(0);
        }
        Err(e) => return Err(e),
    };

    // Dropping the pipe sends EOF.
    drop(pipe);
    Ok(copied)
}

async fn drain_stdout(pipe: Option<ChildStdout>, sink: Option<&mut OutputSink<'_>>) -> io::Result<Vec<u8>> {
    let Some(mut pipe) = pipe else {
        return Ok(Vec::new());
    };

    match sink {
        Some(sink) => {
            tokio::io::copy(&mut pipe, &mut *sink).await?;
            sink.flush().await?;
            Ok(Vec::new())
        }
        None => {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf).await?;
            Ok(buf)
        }
    }
}

async fn drain_stderr(pipe: Option<ChildStderr>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

fn display_args(args: &[OsString]) -> String {
    args.iter()
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::binwrap::BinarySource;

    fn empty_runner<'io>() -> ProcessRunner<'io> {
        ProcessRunner::new(Arc::new(BinaryRegistry::new("nothing")))
    }

    #[test]
    fn arguments_accumulate_in_order() {
        let mut runner = empty_runner();
        runner.arg("-quality", ["80"]).flag("-optimize").arg("-outfile", ["out.jpg"]);
        let args: Vec<_> = runner.arguments().iter().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(args, ["-quality", "80", "-optimize", "-outfile", "out.jpg"]);
    }

    #[test]
    fn zero_timeout_is_unbounded() {
        let mut runner = empty_runner();
        runner.set_timeout(Duration::from_secs(2));
        assert_eq!(runner.timeout(), Some(Duration::from_secs(2)));
        runner.set_timeout(Duration::ZERO);
        assert_eq!(runner.timeout(), None);
    }

    #[test]
    fn reset_clears_run_state() {
        let mut runner = empty_runner();
        runner
            .arg("-copy", ["none"])
            .set_env([("A", "1")])
            .set_stdin(&b"input"[..])
            .set_stdout_sink(Vec::new())
            .set_timeout(Duration::from_secs(1));
        runner.reset();
        assert!(runner.arguments().is_empty());
        assert!(runner.env().is_none());
        assert!(runner.stdout().is_empty());
        assert!(runner.stderr().is_empty());
        assert!(runner.last_result().is_none());
        assert!(!runner.is_running());
        // reset keeps the timeout and is idempotent
        assert_eq!(runner.timeout(), Some(Duration::from_secs(1)));
        runner.reset();
        assert!(runner.arguments().is_empty());
    }

    #[test]
    fn config_applies_timeout_debug_and_env() {
        let config = RunnerConfig {
            timeout_ms: Some(250),
            debug: true,
            env: Some(BTreeMap::from([("LANG".to_string(), "C".to_string())])),
        };
        let runner = ProcessRunner::with_config(Arc::new(BinaryRegistry::new("x")), &config);
        assert_eq!(runner.timeout(), Some(Duration::from_millis(250)));
        assert_eq!(runner.env().map(|e| e.len()), Some(1));
    }

    #[test]
    fn kill_when_idle_is_noop() {
        let runner = empty_runner();
        assert!(!runner.kill());
        assert!(!runner.kill_handle().kill());
        assert_eq!(runner.kill_handle().pid(), None);
    }

    #[tokio::test]
    async fn run_without_sources_is_config_error() {
        let mut runner = empty_runner();
        let err = runner.run(["-version"]).await.unwrap_err();
        assert!(matches!(err, ToolError::Config(_)));
        assert!(runner.last_result().is_none());
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn run_on_foreign_platform_only_is_unsupported() {
        let registry = BinaryRegistry::new("tool")
            .with_source(BinarySource::new(b"x".to_vec()).os("plan9").arch("mips"));
        let mut runner = ProcessRunner::new(Arc::new(registry));
        let err = runner.run(Vec::<String>::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::UnsupportedPlatform { .. }));
    }

    #[test]
    fn check_maps_statuses_to_errors() {
        let mut result = RunResult {
            status: RunStatus::Failed { code: Some(2) },
            stdout: b"out".to_vec(),
            stderr: b"bad input\n".to_vec(),
            elapsed: Duration::from_millis(5),
        };
        match result.check() {
            Err(ToolError::NonZeroExit { code, stderr }) => {
                assert_eq!(code, Some(2));
                assert_eq!(stderr, "bad input");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(result.combined_output(), b"outbad input\n");

        result.status = RunStatus::TimedOut { elapsed: Duration::from_millis(1500) };
        assert!(matches!(result.check(), Err(ToolError::Timeout { elapsed_ms: 1500 })));

        result.status = RunStatus::Killed;
        assert!(matches!(result.check(), Err(ToolError::Killed)));

        result.status = RunStatus::Success;
        assert!(result.check().is_ok());
    }
}
