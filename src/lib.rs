//! Vanity keypair search sessions.
//!
//! Validates requested address patterns, estimates their cost, and runs one
//! `solana-keygen grind` process per session under a small state machine.

pub mod assistant;
pub mod config;
pub mod console;
pub mod error;
pub mod grind;
pub mod pattern;
pub mod session;

pub use config::Config;
pub use error::{GrindError, GrindResult};
pub use session::{Intent, SessionCoordinator, SessionEvent, SessionStatus};
