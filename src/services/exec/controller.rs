//! Process Execution Controller
//!
//! Owns one external process (local subprocess or remote command) from
//! launch to termination under a hard wall-clock deadline. Output is either
//! collected once (`Buffered`) or fed line by line to a `ReportSink`
//! (`Incremental`). Pipes are read in bounded chunks, so a process that
//! floods its output is killed instead of filling memory. Every exit path
//! releases the child before returning.

use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chat_companion_core::{EditOutcome, StreamBuffer};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::remote::{shell_quote, RemoteSessionBackend};
use crate::models::settings::{ExecConfig, StreamingPolicy};
use crate::utils::error::{AppError, AppResult};

/// Exit status `ssh` uses for its own connection failures.
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Bytes of output kept per stream unless configured otherwise.
pub const DEFAULT_OUTPUT_LIMIT: usize = 8 * 1024 * 1024;

/// Bytes read from a pipe at a time.
const READ_CHUNK: usize = 8 * 1024;

/// How long readers may drain after a size kill.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where a command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    Local,
    Remote,
}

/// Command to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Interpreted by `sh -c` (locally or by the remote login shell).
    Shell(String),
    /// A program with explicit arguments, no shell involved locally.
    Program { program: String, args: Vec<String> },
}

impl CommandLine {
    pub fn shell(command: impl Into<String>) -> Self {
        Self::Shell(command.into())
    }

    pub fn program<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Program {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Single string suitable for a remote shell.
    pub fn to_shell_string(&self) -> String {
        match self {
            CommandLine::Shell(command) => command.clone(),
            CommandLine::Program { program, args } => std::iter::once(program)
                .chain(args.iter())
                .map(|part| shell_quote(part))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLine::Shell(command) => write!(f, "{}", command),
            CommandLine::Program { program, args } => {
                write!(f, "{}", program)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                Ok(())
            }
        }
    }
}

/// Why the controller terminated a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillReason {
    TimeLimit,
    SizeLimit,
    Cancelled,
}

impl fmt::Display for KillReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KillReason::TimeLimit => write!(f, "Time limit reached"),
            KillReason::SizeLimit => write!(f, "Message too long"),
            KillReason::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// How an execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process exited by itself.
    Completed { exit_code: Option<i32> },
    /// Killed when the deadline elapsed.
    DeadlineKilled,
    /// Killed when the report would have exceeded the size ceiling.
    SizeLimitKilled,
    /// Killed because the sink asked to stop.
    Cancelled,
}

impl Termination {
    pub fn kill_reason(&self) -> Option<KillReason> {
        match self {
            Termination::Completed { .. } => None,
            Termination::DeadlineKilled => Some(KillReason::TimeLimit),
            Termination::SizeLimitKilled => Some(KillReason::SizeLimit),
            Termination::Cancelled => Some(KillReason::Cancelled),
        }
    }
}

/// One running (or finished) external process.
#[derive(Debug, Clone)]
pub struct ProcessSession {
    pub id: Uuid,
    pub mode: ExecMode,
    pub pid: Option<u32>,
    pub started_at: Instant,
    pub deadline: Instant,
    pub killed: Option<KillReason>,
    pub exit_code: Option<i32>,
}

impl ProcessSession {
    fn new(mode: ExecMode, pid: Option<u32>, budget: Duration) -> Self {
        let started_at = Instant::now();
        Self {
            id: Uuid::new_v4(),
            mode,
            pid,
            started_at,
            deadline: started_at + budget,
            killed: None,
            exit_code: None,
        }
    }
}

/// Final result of one execution.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub session: ProcessSession,
    pub termination: Termination,
    pub output: StreamBuffer,
}

impl ExecutionReport {
    /// Whether the output did not fit inline.
    pub fn is_truncated(&self) -> bool {
        self.output.is_truncated()
    }

    pub fn elapsed(&self) -> Duration {
        Instant::now().saturating_duration_since(self.session.started_at)
    }
}

/// Consumer of incremental output.
#[async_trait]
pub trait ReportSink: Send {
    /// Called once the process is running.
    async fn on_start(&mut self, _session: &ProcessSession) {}

    /// Called after each line is appended to the buffer. Returning
    /// `EditOutcome::Failed` stops the execution.
    async fn on_increment(&mut self, buffer: &StreamBuffer) -> EditOutcome;
}

/// Sink that ignores every increment.
pub struct NullSink;

#[async_trait]
impl ReportSink for NullSink {
    async fn on_increment(&mut self, _buffer: &StreamBuffer) -> EditOutcome {
        EditOutcome::Delivered
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Launches processes under a deadline and a size ceiling.
pub struct ProcessController {
    deadline: Duration,
    size_limit: usize,
    output_limit: usize,
    remote: Option<Arc<dyn RemoteSessionBackend>>,
}

impl ProcessController {
    pub fn new(deadline: Duration, size_limit: usize) -> Self {
        Self {
            deadline,
            size_limit,
            output_limit: DEFAULT_OUTPUT_LIMIT,
            remote: None,
        }
    }

    pub fn from_config(config: &ExecConfig) -> Self {
        Self::new(Duration::from_secs(config.deadline_secs), config.size_limit)
            .with_output_limit(config.output_limit_bytes)
    }

    /// Cap on captured bytes per stream. Crossing it kills the process.
    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit = bytes;
        self
    }

    /// Enable `ExecMode::Remote` through the given backend.
    pub fn with_remote(mut self, backend: Arc<dyn RemoteSessionBackend>) -> Self {
        self.remote = Some(backend);
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn size_limit(&self) -> usize {
        self.size_limit
    }

    pub fn output_limit(&self) -> usize {
        self.output_limit
    }

    pub fn remote(&self) -> Option<&Arc<dyn RemoteSessionBackend>> {
        self.remote.as_ref()
    }

    fn build_command(&self, command: &CommandLine, mode: ExecMode) -> AppResult<Command> {
        let mut cmd = match mode {
            ExecMode::Local => match command {
                CommandLine::Shell(line) => {
                    #[cfg(windows)]
                    let (shell, shell_arg) = ("cmd", "/C");
                    #[cfg(not(windows))]
                    let (shell, shell_arg) = ("sh", "-c");

                    let mut cmd = Command::new(shell);
                    cmd.arg(shell_arg).arg(line);
                    cmd
                }
                CommandLine::Program { program, args } => {
                    let mut cmd = Command::new(program);
                    cmd.args(args);
                    cmd
                }
            },
            ExecMode::Remote => {
                let backend = self
                    .remote
                    .as_ref()
                    .ok_or_else(|| AppError::connection("Remote execution is not configured"))?;
                backend.command(&command.to_shell_string())
            }
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Ok(cmd)
    }

    /// Run `command` to termination.
    ///
    /// `reserved` characters of the size ceiling are left for text the
    /// caller renders around the output. With `StreamingPolicy::Buffered`
    /// the sink is never called.
    pub async fn execute(
        &self,
        command: &CommandLine,
        mode: ExecMode,
        policy: StreamingPolicy,
        reserved: usize,
        sink: &mut dyn ReportSink,
    ) -> AppResult<ExecutionReport> {
        let mut cmd = self.build_command(command, mode)?;
        let mut child = cmd
            .spawn()
            .map_err(|e| AppError::command(format!("Failed to spawn '{}': {}", command, e)))?;

        let mut session = ProcessSession::new(mode, child.id(), self.deadline);
        tracing::debug!(
            "[Exec] Started {} ({:?}, pid {:?}): {}",
            session.id,
            mode,
            session.pid,
            command
        );
        sink.on_start(&session).await;

        let limits = Limits {
            deadline: session.deadline,
            output_bytes: self.output_limit,
        };
        let mut output = StreamBuffer::new(self.size_limit)
            .with_reserved(reserved)
            .with_overflow_limit(self.output_limit);
        let termination = match policy {
            StreamingPolicy::Buffered => run_buffered(&mut child, limits, &mut output).await?,
            StreamingPolicy::Incremental { .. } => {
                run_incremental(&mut child, limits, &mut output, sink).await?
            }
        };

        session.killed = termination.kill_reason();
        if let Termination::Completed { exit_code } = termination {
            session.exit_code = exit_code;
            if mode == ExecMode::Remote && exit_code == Some(SSH_CONNECTION_FAILURE) {
                let detail = output.full_output();
                return Err(AppError::connection(format!(
                    "Could not reach remote host: {}",
                    detail.trim()
                )));
            }
        }

        tracing::debug!(
            "[Exec] Session {} ended: {:?} after {:?}",
            session.id,
            termination,
            Instant::now().saturating_duration_since(session.started_at)
        );

        Ok(ExecutionReport {
            session,
            termination,
            output,
        })
    }
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Limits {
    deadline: Instant,
    output_bytes: usize,
}

async fn run_buffered(
    child: &mut Child,
    limits: Limits,
    output: &mut StreamBuffer,
) -> AppResult<Termination> {
    let capped = CancellationToken::new();
    let stdout_task = child
        .stdout
        .take()
        .map(|stream| spawn_reader(stream, limits.output_bytes, capped.clone()));
    let stderr_task = child
        .stderr
        .take()
        .map(|stream| spawn_reader(stream, limits.output_bytes, capped.clone()));

    let status = tokio::select! {
        status = child.wait() => Some(status?),
        _ = capped.cancelled() => {
            kill(child).await;
            None
        }
        _ = tokio::time::sleep_until(limits.deadline) => {
            kill(child).await;
            abort(stdout_task);
            abort(stderr_task);
            return Ok(Termination::DeadlineKilled);
        }
    };

    let status = match status {
        Some(status) if !capped.is_cancelled() => status,
        _ => {
            let drain = drain_deadline(limits.deadline);
            let stdout = join_reader(stdout_task, drain).await;
            let stderr = join_reader(stderr_task, drain).await;
            output.push(&stdout.unwrap_or_default());
            output.push(&stderr.unwrap_or_default());
            return Ok(Termination::SizeLimitKilled);
        }
    };

    let Some(stdout) = join_reader(stdout_task, limits.deadline).await else {
        kill(child).await;
        abort(stderr_task);
        return Ok(Termination::DeadlineKilled);
    };
    let Some(stderr) = join_reader(stderr_task, limits.deadline).await else {
        kill(child).await;
        return Ok(Termination::DeadlineKilled);
    };

    output.push(&stdout);
    output.push(&stderr);
    Ok(Termination::Completed {
        exit_code: status.code(),
    })
}

async fn run_incremental(
    child: &mut Child,
    limits: Limits,
    output: &mut StreamBuffer,
    sink: &mut dyn ReportSink,
) -> AppResult<Termination> {
    let capped = CancellationToken::new();
    let stderr_task = child
        .stderr
        .take()
        .map(|stream| spawn_reader(stream, limits.output_bytes, capped.clone()));
    let Some(mut stdout) = child.stdout.take() else {
        kill(child).await;
        abort(stderr_task);
        return Err(AppError::internal("Process stdout was not captured"));
    };
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let read = tokio::select! {
            read = timeout_at(limits.deadline, stdout.read(&mut chunk)) => read,
            _ = capped.cancelled() => {
                kill(child).await;
                flush_pending(&mut pending, output);
                let stderr = join_reader(stderr_task, drain_deadline(limits.deadline)).await;
                output.push(&stderr.unwrap_or_default());
                return Ok(Termination::SizeLimitKilled);
            }
        };

        match read {
            Err(_) => {
                kill(child).await;
                abort(stderr_task);
                flush_pending(&mut pending, output);
                return Ok(Termination::DeadlineKilled);
            }
            Ok(Err(e)) => {
                kill(child).await;
                abort(stderr_task);
                return Err(e.into());
            }
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => {
                pending.extend_from_slice(&chunk[..n]);
                while let Some(end) = pending.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=end).collect();
                    if let Some(termination) = push_line(&line, output, sink).await {
                        kill(child).await;
                        abort(stderr_task);
                        return Ok(termination);
                    }
                }
                // An unterminated line that can no longer fit ends the run.
                if pending.len() > output.remaining()
                    && String::from_utf8_lossy(&pending).chars().count() > output.remaining()
                {
                    flush_pending(&mut pending, output);
                    kill(child).await;
                    abort(stderr_task);
                    return Ok(Termination::SizeLimitKilled);
                }
            }
        }
    }

    if !pending.is_empty() {
        if let Some(termination) = push_line(&pending, output, sink).await {
            kill(child).await;
            abort(stderr_task);
            return Ok(termination);
        }
    }

    // stdout closed: wait for exit, then append stderr once.
    let status = tokio::select! {
        status = timeout_at(limits.deadline, child.wait()) => match status {
            Ok(status) => status?,
            Err(_) => {
                kill(child).await;
                abort(stderr_task);
                return Ok(Termination::DeadlineKilled);
            }
        },
        _ = capped.cancelled() => {
            kill(child).await;
            let stderr = join_reader(stderr_task, drain_deadline(limits.deadline)).await;
            output.push(&stderr.unwrap_or_default());
            return Ok(Termination::SizeLimitKilled);
        }
    };
    let Some(stderr) = join_reader(stderr_task, limits.deadline).await else {
        return Ok(Termination::DeadlineKilled);
    };
    if !stderr.is_empty() && output.push(&stderr) {
        // Last increment; a failed edit here changes nothing.
        sink.on_increment(output).await;
    }

    Ok(Termination::Completed {
        exit_code: status.code(),
    })
}

/// Append one line and notify the sink. `Some` when the run must stop.
async fn push_line(
    line: &[u8],
    output: &mut StreamBuffer,
    sink: &mut dyn ReportSink,
) -> Option<Termination> {
    if !output.push(&String::from_utf8_lossy(line)) {
        return Some(Termination::SizeLimitKilled);
    }
    if !sink.on_increment(output).await.should_continue() {
        return Some(Termination::Cancelled);
    }
    None
}

fn flush_pending(pending: &mut Vec<u8>, output: &mut StreamBuffer) {
    if !pending.is_empty() {
        output.push(&String::from_utf8_lossy(pending));
        pending.clear();
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read `stream` to its end, keeping at most `limit` bytes. Cancels
/// `capped` and stops reading once the stream goes past the limit.
fn spawn_reader<R>(stream: R, limit: usize, capped: CancellationToken) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let mut limited = stream.take(limit as u64 + 1);
        let _ = limited.read_to_end(&mut buf).await;
        if buf.len() > limit {
            buf.truncate(limit);
            capped.cancel();
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn drain_deadline(deadline: Instant) -> Instant {
    (Instant::now() + DRAIN_GRACE).min(deadline)
}

/// Output of a reader task, or `None` when the deadline elapsed first.
async fn join_reader(task: Option<JoinHandle<String>>, deadline: Instant) -> Option<String> {
    let Some(mut task) = task else {
        return Some(String::new());
    };
    match timeout_at(deadline, &mut task).await {
        Ok(joined) => Some(joined.unwrap_or_default()),
        Err(_) => {
            task.abort();
            None
        }
    }
}

fn abort(task: Option<JoinHandle<String>>) {
    if let Some(task) = task {
        task.abort();
    }
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::warn!("[Exec] Failed to kill pid {:?}: {}", child.id(), e);
    }
}
