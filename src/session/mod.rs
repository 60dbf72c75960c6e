//! Session Management
//!
//! Per-conversation state machine for the search flow:
//! - Concurrent session store with per-session exclusion (DashMap)
//! - Session-scoped notifications over a broadcast channel
//! - At most one running search per session

pub mod coordinator;
pub mod events;
pub mod state;
pub mod store;

pub use coordinator::{Intent, SessionCoordinator};
pub use events::{FailureKind, SessionEvent, SessionEventEmitter};
pub use state::{Session, SessionInfo, SessionStatus};
pub use store::SessionStore;
