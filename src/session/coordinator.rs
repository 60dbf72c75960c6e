//! Session Coordinator
//!
//! The entry point front ends call. Each intent runs under its session's
//! lock, drives the state machine and emits notifications. Different
//! sessions proceed in parallel.

use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{FailureKind, SessionEvent, SessionEventEmitter};
use super::state::{Session, SessionStatus};
use super::store::SessionStore;
use crate::assistant::{pick_suggestions, AssistantService, DEFAULT_SUGGESTION_PROMPT};
use crate::config::Config;
use crate::error::GrindError;
use crate::grind::{Generation, GenerationOutcome, GenerationSupervisor, ProgressSink, ProgressTick};
use crate::pattern::{validate, DifficultyEstimator, MatchMode, PatternSpec, RejectionReason};

/// Something a user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    SelectMode(MatchMode),
    SubmitPattern(String),
    ConfirmProceed,
    CancelPending,
    Stop,
    Reset,
    ToggleIgnoreCase,
    RequestAiPatternSuggestion(String),
    AskAssistant(String),
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectMode(_) => "select-mode",
            Self::SubmitPattern(_) => "submit-pattern",
            Self::ConfirmProceed => "confirm",
            Self::CancelPending => "cancel-pending",
            Self::Stop => "stop",
            Self::Reset => "reset",
            Self::ToggleIgnoreCase => "toggle-ignore-case",
            Self::RequestAiPatternSuggestion(_) => "suggest",
            Self::AskAssistant(_) => "ask",
        }
    }
}

/// Coordinates sessions, searches and notifications. Cheap to clone.
#[derive(Clone)]
pub struct SessionCoordinator {
    store: SessionStore,
    events: SessionEventEmitter,
    supervisor: GenerationSupervisor,
    estimator: DifficultyEstimator,
    assistant: Option<Arc<dyn AssistantService>>,
    max_suggestions: usize,
}

impl SessionCoordinator {
    pub fn new(config: &Config) -> Self {
        Self {
            store: SessionStore::new(),
            events: SessionEventEmitter::default(),
            supervisor: GenerationSupervisor::new(config.keygen.clone(), config.supervisor.clone()),
            estimator: DifficultyEstimator::new(&config.estimate),
            assistant: None,
            max_suggestions: config.assistant.max_suggestions,
        }
    }

    pub fn with_assistant(mut self, assistant: Arc<dyn AssistantService>) -> Self {
        self.assistant = Some(assistant);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Apply an intent and return the session's resulting status
    pub async fn dispatch(&self, session_id: &str, intent: Intent) -> SessionStatus {
        debug!("Session {}: {}", session_id, intent.name());

        let entry = self.store.entry(session_id);
        let mut session = entry.lock().await;
        session.touch();

        if session.is_generating() && intent != Intent::Stop {
            self.events.emit(SessionEvent::Busy {
                session_id: session_id.to_string(),
            });
            return session.status;
        }

        match intent {
            Intent::SelectMode(mode) => {
                session.select_mode(mode);
                self.events.emit(SessionEvent::AwaitingPattern {
                    session_id: session.id.clone(),
                    mode,
                });
            }
            Intent::SubmitPattern(text) => self.submit_pattern(&mut session, &text).await,
            Intent::ConfirmProceed => self.confirm(&mut session).await,
            Intent::CancelPending => self.cancel_pending(&mut session),
            Intent::Stop => self.stop(&mut session).await,
            Intent::Reset => {
                session.reset();
                self.events.emit(SessionEvent::SessionReset {
                    session_id: session.id.clone(),
                });
            }
            Intent::ToggleIgnoreCase => {
                session.case_sensitive = !session.case_sensitive;
                self.events.emit(SessionEvent::CaseSensitivityChanged {
                    session_id: session.id.clone(),
                    case_sensitive: session.case_sensitive,
                });
            }
            Intent::RequestAiPatternSuggestion(prompt) => {
                let status = session.status;
                drop(session);
                self.suggest(session_id, &prompt).await;
                return status;
            }
            Intent::AskAssistant(question) => {
                let status = session.status;
                drop(session);
                self.ask(session_id, &question).await;
                return status;
            }
        }

        session.status
    }

    async fn submit_pattern(&self, session: &mut Session, text: &str) {
        let mode = match session.pending_mode {
            Some(mode) if session.status.accepts_pattern() => mode,
            _ => {
                self.reject(session, RejectionReason::NoModeSelected);
                return;
            }
        };

        let spec = match validate(text, mode, session.side_hint, session.case_sensitive) {
            Ok(spec) => spec,
            Err(reason) => {
                debug!("Session {}: pattern rejected: {}", session.id, reason);
                self.reject(session, reason);
                return;
            }
        };

        if spec.risk_tier().requires_confirmation() {
            let estimate = self.estimator.estimate(&spec, spec.case_sensitive());
            info!(
                "Session {}: {} needs confirmation (~{})",
                session.id,
                spec,
                estimate.human()
            );
            self.events.emit(SessionEvent::RiskWarning {
                session_id: session.id.clone(),
                spec: spec.clone(),
                human: estimate.human(),
                estimate,
            });
            session.pending_spec = Some(spec);
            session.set_status(SessionStatus::AwaitingConfirmation);
            return;
        }

        session.pending_spec = None;
        self.begin(session, spec).await;
    }

    async fn confirm(&self, session: &mut Session) {
        if session.status != SessionStatus::AwaitingConfirmation {
            self.reject(session, RejectionReason::NothingToConfirm);
            return;
        }
        match session.pending_spec.take() {
            Some(spec) => self.begin(session, spec).await,
            None => self.reject(session, RejectionReason::NothingToConfirm),
        }
    }

    fn cancel_pending(&self, session: &mut Session) {
        if !session.status.accepts_pattern() {
            self.reject(session, RejectionReason::NothingToConfirm);
            return;
        }
        session.discard_pending();
        self.events.emit(SessionEvent::PendingDiscarded {
            session_id: session.id.clone(),
        });
    }

    /// Confirmed to Generating. Runs under the session lock, so a second
    /// submission for the same session sees `Generating` and gets `Busy`.
    async fn begin(&self, session: &mut Session, spec: PatternSpec) {
        session.spec = Some(spec.clone());
        session.set_status(SessionStatus::Confirmed);

        let events = self.events.clone();
        let progress_id = session.id.clone();
        let progress: Arc<dyn ProgressSink> = Arc::new(move |tick: ProgressTick| {
            events.emit(SessionEvent::Progress {
                session_id: progress_id.clone(),
                fraction: tick.fraction,
                elapsed_secs: tick.elapsed.as_secs(),
            });
        });

        let Generation { handle, outcome } = match self.supervisor.start(&spec, progress).await {
            Ok(generation) => generation,
            Err(e) if e.is_configuration() => {
                error!("Session {}: {}", session.id, e);
                session.spec = None;
                session.pending_mode = None;
                session.last_error = Some(e.to_string());
                session.set_status(SessionStatus::Idle);
                self.events.emit(SessionEvent::ToolUnavailable {
                    session_id: session.id.clone(),
                    message: e.to_string(),
                });
                return;
            }
            Err(e) => {
                error!("Session {}: search failed to start: {}", session.id, e);
                session.set_failed(e.to_string());
                self.events.emit(SessionEvent::Failed {
                    session_id: session.id.clone(),
                    kind: FailureKind::ToolError,
                    message: e.to_string(),
                });
                return;
            }
        };

        let generation_id = handle.id();
        let estimate = self.estimator.estimate(&spec, spec.case_sensitive());
        session.started_at = Some(handle.started_at());
        session.supervisor = Some(handle);
        session.last_error = None;
        session.set_status(SessionStatus::Generating);

        info!("Session {}: searching for {} (search {})", session.id, spec, generation_id);
        self.events.emit(SessionEvent::GenerationStarted {
            session_id: session.id.clone(),
            spec,
            human: estimate.human(),
            estimate,
        });

        let coordinator = self.clone();
        let session_id = session.id.clone();
        tokio::spawn(async move {
            match outcome.await {
                Ok(outcome) => coordinator.finish(&session_id, generation_id, outcome).await,
                Err(_) => warn!("Search {} ended without an outcome", generation_id),
            }
        });
    }

    /// Apply a search outcome, unless the session has moved on from that search
    pub(crate) async fn finish(&self, session_id: &str, generation_id: Uuid, outcome: GenerationOutcome) {
        let Some(entry) = self.store.get(session_id) else {
            return;
        };
        let mut session = entry.lock().await;

        let current = session.supervisor.as_ref().map(|h| h.id());
        if !session.is_generating() || current != Some(generation_id) {
            debug!(
                "Session {}: discarding {:?} from search {} (status {})",
                session_id, outcome, generation_id, session.status
            );
            return;
        }

        let event = match outcome {
            GenerationOutcome::Success { locator } => {
                info!("Session {}: keypair written to {}", session_id, locator);
                session.set_completed(locator.clone());
                SessionEvent::Completed {
                    session_id: session_id.to_string(),
                    locator,
                }
            }
            GenerationOutcome::ToolError { message } => {
                warn!("Session {}: search failed: {}", session_id, message);
                session.set_failed(message.clone());
                SessionEvent::Failed {
                    session_id: session_id.to_string(),
                    kind: FailureKind::ToolError,
                    message,
                }
            }
            GenerationOutcome::NoKeypairProduced => {
                let message = GrindError::NoKeypairProduced.to_string();
                warn!("Session {}: {}", session_id, message);
                session.set_failed(message.clone());
                SessionEvent::Failed {
                    session_id: session_id.to_string(),
                    kind: FailureKind::NoKeypairProduced,
                    message,
                }
            }
            GenerationOutcome::Cancelled => {
                session.set_cancelled();
                SessionEvent::Cancelled {
                    session_id: session_id.to_string(),
                }
            }
        };
        self.events.emit(event);
    }

    /// Stop the running search. Reports `Cancelled` only after the process is gone.
    async fn stop(&self, session: &mut Session) {
        if !session.is_generating() {
            self.reject(session, RejectionReason::NotGenerating);
            return;
        }

        if let Some(handle) = session.supervisor.take() {
            info!("Session {}: stopping search {}", session.id, handle.id());
            handle.stop().await;
        }

        session.set_cancelled();
        self.events.emit(SessionEvent::Cancelled {
            session_id: session.id.clone(),
        });
    }

    async fn suggest(&self, session_id: &str, prompt: &str) {
        let Some(assistant) = self.assistant.as_ref() else {
            self.assistant_unavailable(session_id, "no assistant is configured");
            return;
        };

        let prompt = match prompt.trim() {
            "" => DEFAULT_SUGGESTION_PROMPT,
            prompt => prompt,
        };

        match assistant.suggest_patterns(prompt).await {
            Ok(candidates) => {
                let patterns = pick_suggestions(&candidates, self.max_suggestions, &mut rand::thread_rng());
                debug!(
                    "Session {}: {} of {} suggestions usable",
                    session_id,
                    patterns.len(),
                    candidates.len()
                );
                self.events.emit(SessionEvent::Suggestions {
                    session_id: session_id.to_string(),
                    patterns,
                });
            }
            Err(e) => {
                warn!("Session {}: suggestion request failed: {}", session_id, e);
                self.assistant_unavailable(session_id, &e.to_string());
            }
        }
    }

    async fn ask(&self, session_id: &str, question: &str) {
        let question = question.trim();
        if question.is_empty() {
            self.events
                .emit(SessionEvent::rejected(session_id, RejectionReason::EmptyQuestion));
            return;
        }

        let Some(assistant) = self.assistant.as_ref() else {
            self.assistant_unavailable(session_id, "no assistant is configured");
            return;
        };

        match assistant.answer(question).await {
            Ok(answer) => self.events.emit(SessionEvent::AssistantReply {
                session_id: session_id.to_string(),
                answer,
            }),
            Err(e) => {
                warn!("Session {}: question failed: {}", session_id, e);
                self.assistant_unavailable(session_id, &e.to_string());
            }
        }
    }

    fn reject(&self, session: &Session, reason: RejectionReason) {
        self.events.emit(SessionEvent::rejected(&session.id, reason));
    }

    fn assistant_unavailable(&self, session_id: &str, message: &str) {
        self.events.emit(SessionEvent::AssistantUnavailable {
            session_id: session_id.to_string(),
            message: message.to_string(),
        });
    }

    /// Stop every running search, for host shutdown
    pub async fn shutdown_all(&self) {
        info!("Shutting down all sessions...");

        for entry in self.store.entries() {
            let mut session = entry.lock().await;
            if session.is_generating() {
                self.stop(&mut session).await;
            }
        }

        info!("All sessions shut down");
    }
}
