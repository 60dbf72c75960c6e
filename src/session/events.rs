//! Session Events
//!
//! Outbound notifications, each keyed by the session it concerns, and the
//! broadcast emitter front ends subscribe to.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::pattern::{Estimate, MatchMode, PatternSpec, RejectionReason};

/// Why a finished search counts as failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Non-zero exit or diagnostic output
    ToolError,
    /// Clean exit without a keypair
    NoKeypairProduced,
}

/// Events emitted to front ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// A mode was chosen; pattern text is expected next
    AwaitingPattern {
        session_id: String,
        mode: MatchMode,
    },

    /// An intent or pattern was refused; state is unchanged
    Rejected {
        session_id: String,
        reason: RejectionReason,
        message: String,
    },

    /// A slow pattern needs explicit confirmation
    RiskWarning {
        session_id: String,
        spec: PatternSpec,
        estimate: Estimate,
        human: String,
    },

    /// The search process is running
    GenerationStarted {
        session_id: String,
        spec: PatternSpec,
        estimate: Estimate,
        human: String,
    },

    /// Cosmetic progress while searching
    Progress {
        session_id: String,
        fraction: f64,
        elapsed_secs: u64,
    },

    Completed {
        session_id: String,
        locator: String,
    },

    Failed {
        session_id: String,
        kind: FailureKind,
        message: String,
    },

    Cancelled {
        session_id: String,
    },

    /// A search is running; only a stop is accepted
    Busy {
        session_id: String,
    },

    /// The search tool is missing or broken. Not the user's fault.
    ToolUnavailable {
        session_id: String,
        message: String,
    },

    CaseSensitivityChanged {
        session_id: String,
        case_sensitive: bool,
    },

    /// The pending mode and pattern were dropped
    PendingDiscarded {
        session_id: String,
    },

    SessionReset {
        session_id: String,
    },

    Suggestions {
        session_id: String,
        patterns: Vec<String>,
    },

    AssistantReply {
        session_id: String,
        answer: String,
    },

    AssistantUnavailable {
        session_id: String,
        message: String,
    },
}

impl SessionEvent {
    /// Get the session ID from any event
    pub fn session_id(&self) -> &str {
        match self {
            Self::AwaitingPattern { session_id, .. } => session_id,
            Self::Rejected { session_id, .. } => session_id,
            Self::RiskWarning { session_id, .. } => session_id,
            Self::GenerationStarted { session_id, .. } => session_id,
            Self::Progress { session_id, .. } => session_id,
            Self::Completed { session_id, .. } => session_id,
            Self::Failed { session_id, .. } => session_id,
            Self::Cancelled { session_id } => session_id,
            Self::Busy { session_id } => session_id,
            Self::ToolUnavailable { session_id, .. } => session_id,
            Self::CaseSensitivityChanged { session_id, .. } => session_id,
            Self::PendingDiscarded { session_id } => session_id,
            Self::SessionReset { session_id } => session_id,
            Self::Suggestions { session_id, .. } => session_id,
            Self::AssistantReply { session_id, .. } => session_id,
            Self::AssistantUnavailable { session_id, .. } => session_id,
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AwaitingPattern { .. } => "awaiting-pattern",
            Self::Rejected { .. } => "rejected",
            Self::RiskWarning { .. } => "risk-warning",
            Self::GenerationStarted { .. } => "generation-started",
            Self::Progress { .. } => "progress",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Cancelled { .. } => "cancelled",
            Self::Busy { .. } => "busy",
            Self::ToolUnavailable { .. } => "tool-unavailable",
            Self::CaseSensitivityChanged { .. } => "case-sensitivity",
            Self::PendingDiscarded { .. } => "pending-discarded",
            Self::SessionReset { .. } => "session-reset",
            Self::Suggestions { .. } => "suggestions",
            Self::AssistantReply { .. } => "assistant-reply",
            Self::AssistantUnavailable { .. } => "assistant-unavailable",
        }
    }

    pub fn rejected(session_id: &str, reason: RejectionReason) -> Self {
        Self::Rejected {
            session_id: session_id.to_string(),
            message: reason.to_string(),
            reason,
        }
    }
}

/// Broadcasts session events to every subscriber
#[derive(Debug, Clone)]
pub struct SessionEventEmitter {
    tx: broadcast::Sender<SessionEvent>,
}

impl SessionEventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// A receiver that falls more than the capacity behind skips the oldest
    /// events and sees `Lagged`; it should re-read session state after that.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Having no subscribers is not an error.
    pub fn emit(&self, event: SessionEvent) {
        trace!("Session {}: {}", event.session_id(), event.kind());
        if let Err(e) = self.tx.send(event) {
            debug!("No subscribers for {} event", e.0.kind());
        }
    }
}

impl Default for SessionEventEmitter {
    fn default() -> Self {
        Self::new(1024)
    }
}
