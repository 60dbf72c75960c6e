//! Generation Supervisor
//!
//! Owns one child search process: spawns it, drains its output, emits
//! cosmetic progress, honours stop requests and classifies how it ended.
//!
//! Exit detection and progress are separate timers inside one monitor task.
//! The monitor never touches session state, so a caller holding a session
//! lock can wait for it to finish without deadlocking.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use super::command::{grind_args, preflight};
use super::output::{classify_line, BoundedCapture, OutputLine};
use super::progress::cosmetic_fraction;
use crate::config::{KeygenConfig, SupervisorConfig};
use crate::error::{GrindError, GrindResult};
use crate::pattern::PatternSpec;

/// Upper bound on reaping a process after SIGKILL
const KILL_WAIT: Duration = Duration::from_secs(5);

/// How a search attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// The tool wrote a keypair; `locator` is where
    Success { locator: String },
    /// Non-zero exit or diagnostic output
    ToolError { message: String },
    /// Clean exit without the success marker
    NoKeypairProduced,
    /// Stopped on request
    Cancelled,
}

/// One cosmetic progress update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressTick {
    pub fraction: f64,
    pub elapsed: Duration,
}

/// Receives progress ticks. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, tick: ProgressTick);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressTick) + Send + Sync,
{
    fn on_progress(&self, tick: ProgressTick) {
        self(tick)
    }
}

/// Control handle for a running search.
///
/// Dropping the handle without calling [`stop`](Self::stop) also terminates
/// the process, so a supervisor never outlives whoever owns its handle.
pub struct SupervisorHandle {
    id: Uuid,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    stop_tx: Option<oneshot::Sender<()>>,
    exited_rx: watch::Receiver<bool>,
    last_progress: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl SupervisorHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn last_progress_at(&self) -> Option<DateTime<Utc>> {
        *self.last_progress.lock()
    }

    /// Whether the process has exited and its streams are drained
    pub fn has_exited(&self) -> bool {
        *self.exited_rx.borrow()
    }

    /// Request graceful termination and wait until the process is gone.
    ///
    /// The wait is bounded by the stop grace period, the forced-kill wait and
    /// the drain timeout, all enforced by the monitor.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            if tx.send(()).is_err() {
                debug!("Search {} already finished before stop", self.id);
            }
        }

        // Err means the monitor is gone, which only happens after exit.
        let _ = self.exited_rx.wait_for(|exited| *exited).await;
        info!("Search {} stopped", self.id);
    }
}

impl std::fmt::Debug for SupervisorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorHandle")
            .field("id", &self.id)
            .field("pid", &self.pid)
            .field("started_at", &self.started_at)
            .field("exited", &self.has_exited())
            .finish()
    }
}

/// A started search: the control handle plus where its outcome arrives
#[derive(Debug)]
pub struct Generation {
    pub handle: SupervisorHandle,
    pub outcome: oneshot::Receiver<GenerationOutcome>,
}

/// Spawns and supervises search processes
#[derive(Debug, Clone)]
pub struct GenerationSupervisor {
    keygen: KeygenConfig,
    config: SupervisorConfig,
}

impl GenerationSupervisor {
    pub fn new(keygen: KeygenConfig, config: SupervisorConfig) -> Self {
        Self { keygen, config }
    }

    /// Check that the configured tool exists and runs
    pub async fn preflight(&self) -> GrindResult<PathBuf> {
        preflight(&self.keygen.path, self.keygen.version_check_timeout()).await
    }

    /// Preflight the tool, then launch a search for `spec`
    pub async fn start(
        &self,
        spec: &PatternSpec,
        progress: Arc<dyn ProgressSink>,
    ) -> GrindResult<Generation> {
        let tool = self.preflight().await?;
        self.spawn(&tool, spec, progress)
    }

    /// Launch a search with an already resolved tool path
    pub fn spawn(
        &self,
        tool: &Path,
        spec: &PatternSpec,
        progress: Arc<dyn ProgressSink>,
    ) -> GrindResult<Generation> {
        let args = grind_args(spec);

        let mut cmd = Command::new(tool);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.keygen.output_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            GrindError::Configuration(format!("failed to launch {}: {}", tool.display(), e))
        })?;

        let id = Uuid::new_v4();
        let pid = child.id();
        info!("Search {} started: pid {:?}, {} {}", id, pid, tool.display(), args.join(" "));

        let capacity = self.config.max_captured_lines;
        let stdout = Arc::new(Mutex::new(StdoutCapture::new(capacity)));
        let stderr = Arc::new(Mutex::new(BoundedCapture::new(capacity)));

        let readers = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => Readers {
                stdout: spawn_reader(out, id, {
                    let stdout = stdout.clone();
                    move |line| stdout.lock().record(line)
                }),
                stderr: spawn_reader(err, id, {
                    let stderr = stderr.clone();
                    move |line| stderr.lock().push(line)
                }),
            },
            _ => {
                return Err(GrindError::ToolExecution(
                    "search tool streams were not captured".to_string(),
                ))
            }
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let (exited_tx, exited_rx) = watch::channel(false);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let last_progress = Arc::new(Mutex::new(None));

        let monitor = Monitor {
            id,
            config: self.config.clone(),
            output_dir: self.keygen.output_dir.clone(),
            progress,
            last_progress: last_progress.clone(),
            stdout,
            stderr,
        };

        tokio::spawn(async move {
            let outcome = monitor.run(child, readers, stop_rx).await;
            exited_tx.send_replace(true);
            if outcome_tx.send(outcome).is_err() {
                debug!("Search {} outcome had no receiver", id);
            }
        });

        Ok(Generation {
            handle: SupervisorHandle {
                id,
                pid,
                started_at: Utc::now(),
                stop_tx: Some(stop_tx),
                exited_rx,
                last_progress,
            },
            outcome: outcome_rx,
        })
    }
}

/// Stdout lines plus what was recognised in them
#[derive(Debug)]
struct StdoutCapture {
    lines: BoundedCapture,
    locator: Option<String>,
    searched: Option<u64>,
}

impl StdoutCapture {
    fn new(capacity: usize) -> Self {
        Self {
            lines: BoundedCapture::new(capacity),
            locator: None,
            searched: None,
        }
    }

    fn record(&mut self, line: String) {
        match classify_line(&line) {
            OutputLine::KeypairWritten(path) => {
                if self.locator.is_none() {
                    self.locator = Some(path);
                }
            }
            OutputLine::Searched { keypairs } => self.searched = Some(keypairs),
            OutputLine::Other => {}
        }
        self.lines.push(line);
    }
}

struct Readers {
    stdout: JoinHandle<()>,
    stderr: JoinHandle<()>,
}

fn spawn_reader<R, F>(stream: R, id: Uuid, mut sink: F) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    F: FnMut(String) + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    sink(line.trim_end_matches(['\r', '\n']).to_string());
                }
                Err(e) => {
                    warn!("Search {} output read failed: {}", id, e);
                    break;
                }
            }
        }
    })
}

/// How the monitor loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExitKind {
    Stopped,
    Exited { success: bool, status: String },
    WaitFailed(String),
}

impl From<ExitStatus> for ExitKind {
    fn from(status: ExitStatus) -> Self {
        Self::Exited {
            success: status.success(),
            status: status.to_string(),
        }
    }
}

/// Map a finished process to its outcome.
///
/// A stop always wins. A non-zero exit is a tool error. A clean exit is a
/// success only with the marker line; otherwise stderr text makes it a tool
/// error and silence makes it `NoKeypairProduced`.
pub(crate) fn classify_outcome(
    exit: &ExitKind,
    locator: Option<&str>,
    stderr: &BoundedCapture,
) -> GenerationOutcome {
    match exit {
        ExitKind::Stopped => GenerationOutcome::Cancelled,
        ExitKind::WaitFailed(e) => GenerationOutcome::ToolError {
            message: format!("lost track of the search process: {}", e),
        },
        ExitKind::Exited { success: false, status } => GenerationOutcome::ToolError {
            message: if stderr.is_blank() {
                format!("search tool {}", status)
            } else {
                stderr.text()
            },
        },
        ExitKind::Exited { success: true, .. } => match locator {
            Some(locator) => GenerationOutcome::Success {
                locator: locator.to_string(),
            },
            None if !stderr.is_blank() => GenerationOutcome::ToolError {
                message: stderr.text(),
            },
            None => GenerationOutcome::NoKeypairProduced,
        },
    }
}

struct Monitor {
    id: Uuid,
    config: SupervisorConfig,
    output_dir: Option<PathBuf>,
    progress: Arc<dyn ProgressSink>,
    last_progress: Arc<Mutex<Option<DateTime<Utc>>>>,
    stdout: Arc<Mutex<StdoutCapture>>,
    stderr: Arc<Mutex<BoundedCapture>>,
}

impl Monitor {
    async fn run(
        self,
        mut child: Child,
        readers: Readers,
        mut stop_rx: oneshot::Receiver<()>,
    ) -> GenerationOutcome {
        let started = Instant::now();

        let mut exit_poll = tokio::time::interval(self.config.poll_interval());
        exit_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let progress_every = self.config.progress_interval();
        let mut progress = tokio::time::interval_at(started + progress_every, progress_every);
        progress.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let exit: ExitKind = loop {
            tokio::select! {
                biased;

                // A dropped handle counts as a stop request.
                _ = &mut stop_rx => {
                    self.terminate(&mut child).await;
                    break ExitKind::Stopped;
                }

                _ = exit_poll.tick() => match child.try_wait() {
                    Ok(Some(status)) => break status.into(),
                    Ok(None) => {}
                    Err(e) => break ExitKind::WaitFailed(e.to_string()),
                },

                _ = progress.tick() => match child.try_wait() {
                    Ok(Some(status)) => break status.into(),
                    Ok(None) => self.emit_progress(started.elapsed()),
                    Err(e) => break ExitKind::WaitFailed(e.to_string()),
                },
            }
        };

        if matches!(exit, ExitKind::WaitFailed(_)) {
            self.force_kill(&mut child).await;
        }

        self.drain(readers).await;

        let stdout = self.stdout.lock();
        let stderr = self.stderr.lock();
        if let Some(searched) = stdout.searched {
            debug!("Search {} reported {} keypairs searched", self.id, searched);
        }
        if stdout.lines.dropped() + stderr.dropped() > 0 {
            debug!(
                "Search {} output truncated: {} stdout / {} stderr lines dropped",
                self.id,
                stdout.lines.dropped(),
                stderr.dropped()
            );
        }

        let locator = stdout.locator.as_deref().map(|l| self.resolve_locator(l));
        let outcome = classify_outcome(&exit, locator.as_deref(), &stderr);
        info!(
            "Search {} finished after {:?}: {:?}",
            self.id,
            started.elapsed(),
            exit
        );
        outcome
    }

    fn emit_progress(&self, elapsed: Duration) {
        *self.last_progress.lock() = Some(Utc::now());
        self.progress.on_progress(ProgressTick {
            fraction: cosmetic_fraction(elapsed),
            elapsed,
        });
    }

    /// Ask the process to exit, escalating to a kill after the grace period
    async fn terminate(&self, child: &mut Child) {
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }

        if let Err(e) = request_graceful_exit(child) {
            warn!("Search {}: graceful stop failed: {}", self.id, e);
        }

        let deadline = Instant::now() + self.config.stop_grace();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!("Search {} exited after stop request: {}", self.id, status);
                    return;
                }
                Ok(None) if Instant::now() < deadline => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    tokio::time::sleep(self.config.poll_interval().min(remaining)).await;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Search {}: wait failed during stop: {}", self.id, e);
                    break;
                }
            }
        }

        self.force_kill(child).await;
    }

    async fn force_kill(&self, child: &mut Child) {
        warn!("Force killing search {}", self.id);
        if let Err(e) = child.start_kill() {
            warn!("Search {}: kill failed: {}", self.id, e);
        }
        match tokio::time::timeout(KILL_WAIT, child.wait()).await {
            Ok(Ok(status)) => debug!("Search {} killed: {}", self.id, status),
            Ok(Err(e)) => error!("Search {}: wait after kill failed: {}", self.id, e),
            Err(_) => error!("Search {} did not exit within {:?} of kill", self.id, KILL_WAIT),
        }
    }

    /// Wait for both readers to hit EOF, bounded by the drain timeout
    async fn drain(&self, readers: Readers) {
        let Readers { stdout, stderr } = readers;
        let stdout_abort = stdout.abort_handle();
        let stderr_abort = stderr.abort_handle();

        let both = async {
            let _ = stdout.await;
            let _ = stderr.await;
        };

        if tokio::time::timeout(self.config.drain_timeout(), both).await.is_err() {
            warn!(
                "Search {}: output not drained within {:?}, abandoning readers",
                self.id,
                self.config.drain_timeout()
            );
            stdout_abort.abort();
            stderr_abort.abort();
        }
    }

    fn resolve_locator(&self, locator: &str) -> String {
        match &self.output_dir {
            Some(dir) if Path::new(locator).is_relative() => dir.join(locator).display().to_string(),
            _ => locator.to_string(),
        }
    }
}

#[cfg(unix)]
fn request_graceful_exit(child: &mut Child) -> std::io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;

    // SAFETY: kill(2) has no memory-safety preconditions; the pid belongs to
    // a child we have not reaped yet.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn request_graceful_exit(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}
