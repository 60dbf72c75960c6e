//! Session State
//!
//! Per-conversation state for the keypair search flow.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::grind::SupervisorHandle;
use crate::pattern::{MatchMode, PatternSpec};

/// Where a session is in the search flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No placement mode chosen
    #[default]
    Idle,
    /// Mode chosen, waiting for pattern text
    ModeSelected,
    /// A slow pattern is held until the user confirms it
    AwaitingConfirmation,
    /// Pattern accepted; only observable while a search is being launched
    Confirmed,
    /// A search process is running
    Generating,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    /// Whether pattern text is expected in this state
    pub fn accepts_pattern(&self) -> bool {
        matches!(self, Self::ModeSelected | Self::AwaitingConfirmation)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::ModeSelected => write!(f, "mode_selected"),
            Self::AwaitingConfirmation => write!(f, "awaiting_confirmation"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Generating => write!(f, "generating"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Complete state of one session.
///
/// Only the coordinator mutates this, always under the session's lock.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub status: SessionStatus,
    /// Mode chosen for the next pattern
    pub pending_mode: Option<MatchMode>,
    /// Last single-sided mode chosen; tells which side a lone field of a
    /// both-sides pattern belongs to
    pub side_hint: Option<MatchMode>,
    /// Slow pattern waiting for confirmation
    pub pending_spec: Option<PatternSpec>,
    /// Pattern of the current or last search
    pub spec: Option<PatternSpec>,
    pub case_sensitive: bool,
    /// Present exactly while `status` is `Generating`
    pub supervisor: Option<SupervisorHandle>,
    pub started_at: Option<DateTime<Utc>>,
    /// Keypairs found over the session's lifetime
    pub found_count: u64,
    pub last_locator: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: SessionStatus::Idle,
            pending_mode: None,
            side_hint: None,
            pending_spec: None,
            spec: None,
            case_sensitive: true,
            supervisor: None,
            started_at: None,
            found_count: 0,
            last_locator: None,
            last_error: None,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        if self.status != status {
            debug!("Session {}: {} -> {}", self.id, self.status, status);
        }
        self.status = status;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn is_generating(&self) -> bool {
        self.status == SessionStatus::Generating
    }

    /// Choose the placement for the next pattern
    pub fn select_mode(&mut self, mode: MatchMode) {
        if mode.is_single_sided() {
            self.side_hint = Some(mode);
        }
        self.pending_mode = Some(mode);
        self.pending_spec = None;
        self.spec = None;
        self.set_status(SessionStatus::ModeSelected);
    }

    /// Drop the pending mode and pattern
    pub fn discard_pending(&mut self) {
        self.pending_mode = None;
        self.pending_spec = None;
        self.set_status(SessionStatus::Idle);
    }

    /// Back to the initial state. Lifetime counters are kept.
    pub fn reset(&mut self) {
        self.pending_mode = None;
        self.side_hint = None;
        self.pending_spec = None;
        self.spec = None;
        self.case_sensitive = true;
        self.supervisor = None;
        self.started_at = None;
        self.last_locator = None;
        self.last_error = None;
        self.set_status(SessionStatus::Idle);
    }

    /// A finished attempt needs a fresh mode before the next pattern
    fn end_attempt(&mut self) {
        self.supervisor = None;
        self.pending_mode = None;
        self.pending_spec = None;
    }

    pub fn set_completed(&mut self, locator: impl Into<String>) {
        self.end_attempt();
        self.found_count += 1;
        self.last_locator = Some(locator.into());
        self.last_error = None;
        self.set_status(SessionStatus::Completed);
    }

    pub fn set_failed(&mut self, error: impl Into<String>) {
        self.end_attempt();
        self.last_error = Some(error.into());
        self.set_status(SessionStatus::Failed);
    }

    pub fn set_cancelled(&mut self) {
        self.end_attempt();
        self.set_status(SessionStatus::Cancelled);
    }
}

/// Serializable view of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub status: SessionStatus,
    pub pending_mode: Option<MatchMode>,
    pub pending_pattern: Option<String>,
    pub pattern: Option<String>,
    pub case_sensitive: bool,
    pub pid: Option<u32>,
    pub started_at: Option<String>,
    pub last_progress_at: Option<String>,
    pub found_count: u64,
    pub last_locator: Option<String>,
    pub last_error: Option<String>,
    pub created_at: String,
    pub last_activity: String,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            status: session.status,
            pending_mode: session.pending_mode,
            pending_pattern: session.pending_spec.as_ref().map(ToString::to_string),
            pattern: session.spec.as_ref().map(ToString::to_string),
            case_sensitive: session.case_sensitive,
            pid: session.supervisor.as_ref().and_then(|s| s.pid()),
            started_at: session.started_at.map(|t| t.to_rfc3339()),
            last_progress_at: session
                .supervisor
                .as_ref()
                .and_then(|s| s.last_progress_at())
                .map(|t| t.to_rfc3339()),
            found_count: session.found_count,
            last_locator: session.last_locator.clone(),
            last_error: session.last_error.clone(),
            created_at: session.created_at.to_rfc3339(),
            last_activity: session.last_activity.to_rfc3339(),
        }
    }
}
