//! Console Host
//!
//! Line-oriented front end: reads `<session> <command> [args]` from an input
//! stream and writes every notification as one JSON line. A `lagged` line
//! means notifications were dropped; `status` shows where a session stands.

use log::{debug, info, warn};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::grind::render_bar;
use crate::pattern::MatchMode;
use crate::session::{Intent, SessionCoordinator, SessionEvent};

pub const HELP: &str = "usage: <session> <command> [args]
commands:
  mode starts|ends|both   choose where the pattern goes
  pattern <text>          submit a pattern (both: prefix,suffix)
  confirm                 proceed with a slow pattern
  cancel                  discard the pending pattern
  stop                    stop the running search
  reset                   start over
  ignore-case             toggle case sensitivity
  suggest [prompt]        ask for pattern ideas
  ask <question>          ask the assistant
  status                  show session state";

/// Console input errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("Missing command after session id")]
    MissingCommand,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Unknown mode '{0}', use starts, ends or both")]
    UnknownMode(String),

    #[error("{0} needs an argument")]
    MissingArgument(&'static str),
}

/// A parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Dispatch { session_id: String, intent: Intent },
    Status { session_id: String },
    Help,
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>, ConsoleError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    if matches!(line, "help" | "?") {
        return Ok(Some(Command::Help));
    }

    let (session_id, rest) = split_word(line);
    let (command, args) = split_word(rest);
    if command.is_empty() {
        return Err(ConsoleError::MissingCommand);
    }
    let session_id = session_id.to_string();

    let intent = match command.to_ascii_lowercase().as_str() {
        "mode" => Intent::SelectMode(parse_mode(args)?),
        "pattern" => {
            if args.is_empty() {
                return Err(ConsoleError::MissingArgument("pattern"));
            }
            Intent::SubmitPattern(args.to_string())
        }
        "confirm" => Intent::ConfirmProceed,
        "cancel" => Intent::CancelPending,
        "stop" => Intent::Stop,
        "reset" => Intent::Reset,
        "ignore-case" | "case" => Intent::ToggleIgnoreCase,
        "suggest" => Intent::RequestAiPatternSuggestion(args.to_string()),
        "ask" => Intent::AskAssistant(args.to_string()),
        "status" => return Ok(Some(Command::Status { session_id })),
        "help" => return Ok(Some(Command::Help)),
        other => return Err(ConsoleError::UnknownCommand(other.to_string())),
    };

    Ok(Some(Command::Dispatch { session_id, intent }))
}

fn parse_mode(arg: &str) -> Result<MatchMode, ConsoleError> {
    match arg.to_ascii_lowercase().as_str() {
        "" => Err(ConsoleError::MissingArgument("mode")),
        "starts" | "start" | "starts_with" | "prefix" => Ok(MatchMode::StartsWith),
        "ends" | "end" | "ends_with" | "suffix" => Ok(MatchMode::EndsWith),
        "both" | "starts_and_ends_with" => Ok(MatchMode::StartsAndEndsWith),
        other => Err(ConsoleError::UnknownMode(other.to_string())),
    }
}

fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (s, ""),
    }
}

/// JSON line for an event; progress also carries the rendered bar
pub fn render_event(event: &SessionEvent) -> serde_json::Result<String> {
    let mut value = serde_json::to_value(event)?;
    if let (SessionEvent::Progress { fraction, .. }, Value::Object(map)) = (event, &mut value) {
        map.insert("bar".to_string(), Value::String(render_bar(*fraction)));
    }
    serde_json::to_string(&value)
}

async fn write_line<W>(output: &Mutex<W>, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut out = output.lock().await;
    out.write_all(line.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

/// Work queued for one session
#[derive(Debug)]
enum Job {
    Dispatch(Intent),
    Status,
}

/// Run the console until `input` ends, then stop every search.
///
/// Each session gets its own worker, so lines for one session are handled in
/// order while a slow intent in one session never holds up another. Returns
/// the output sink.
pub async fn run<R, W>(coordinator: SessionCoordinator, input: R, output: W) -> anyhow::Result<W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let output = Arc::new(Mutex::new(output));
    let (done_tx, done_rx) = oneshot::channel();
    let printer = tokio::spawn(print_events(coordinator.subscribe(), output.clone(), done_rx));

    let mut workers: HashMap<String, mpsc::UnboundedSender<Job>> = HashMap::new();
    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    let mut lines = BufReader::new(input).lines();
    while let Some(line) = lines.next_line().await? {
        let (session_id, job) = match parse_line(&line) {
            Ok(None) => continue,
            Ok(Some(Command::Help)) => {
                write_line(&output, &json!({ "type": "help", "text": HELP }).to_string()).await?;
                continue;
            }
            Ok(Some(Command::Status { session_id })) => (session_id, Job::Status),
            Ok(Some(Command::Dispatch { session_id, intent })) => (session_id, Job::Dispatch(intent)),
            Err(e) => {
                warn!("Bad input {:?}: {}", line, e);
                write_line(&output, &json!({ "type": "error", "message": e.to_string() }).to_string())
                    .await?;
                continue;
            }
        };

        let tx = workers.entry(session_id.clone()).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            handles.push(tokio::spawn(session_worker(
                coordinator.clone(),
                session_id.clone(),
                rx,
                output.clone(),
            )));
            tx
        });
        if tx.send(job).is_err() {
            warn!("Session {} worker is gone, dropping input", session_id);
        }
    }

    // Closing the queues lets each worker finish what it already has
    drop(workers);
    for handle in handles {
        if let Err(e) = handle.await {
            warn!("Session worker panicked: {}", e);
        }
    }

    let store = coordinator.store();
    info!(
        "Input closed: {} sessions, {} searching",
        store.len(),
        store.generating_count().await
    );
    coordinator.shutdown_all().await;

    let _ = done_tx.send(());
    printer.await??;

    let output = Arc::try_unwrap(output)
        .map_err(|_| anyhow::anyhow!("console output still shared"))?
        .into_inner();
    Ok(output)
}

async fn session_worker<W>(
    coordinator: SessionCoordinator,
    session_id: String,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    output: Arc<Mutex<W>>,
) where
    W: AsyncWrite + Unpin + Send,
{
    while let Some(job) = jobs.recv().await {
        match job {
            Job::Dispatch(intent) => {
                let status = coordinator.dispatch(&session_id, intent).await;
                debug!("Session {} is now {}", session_id, status);
            }
            Job::Status => {
                let reply = match coordinator.store().snapshot(&session_id).await {
                    Some(info) => json!({ "type": "status", "session": info }),
                    None => json!({ "type": "status", "session_id": session_id, "session": null }),
                };
                if let Err(e) = write_line(&output, &reply.to_string()).await {
                    warn!("Could not write status for session {}: {}", session_id, e);
                }
            }
        }
    }
}

/// Print events until told to finish, then flush what is already queued
async fn print_events<W>(
    mut rx: broadcast::Receiver<SessionEvent>,
    output: Arc<Mutex<W>>,
    mut done: oneshot::Receiver<()>,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        let event = tokio::select! {
            biased;
            event = rx.recv() => event,
            _ = &mut done => break,
        };

        match event {
            Ok(event) => print_event(&output, &event).await?,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Console fell behind, {} events skipped", skipped);
                let line = json!({ "type": "lagged", "skipped": skipped }).to_string();
                write_line(&output, &line).await?;
            }
            Err(broadcast::error::RecvError::Closed) => return Ok(()),
        }
    }

    while let Ok(event) = rx.try_recv() {
        print_event(&output, &event).await?;
    }
    Ok(())
}

async fn print_event<W>(output: &Mutex<W>, event: &SessionEvent) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match render_event(event) {
        Ok(line) => write_line(output, &line).await,
        Err(e) => {
            warn!("Could not render {} event: {}", event.kind(), e);
            Ok(())
        }
    }
}
