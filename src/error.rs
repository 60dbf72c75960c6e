//! Error Types
//!
//! Errors raised while preparing or running a search. Pattern problems are
//! [`RejectionReason`](crate::pattern::RejectionReason)s and never reach here.

use thiserror::Error;

/// Search lifecycle errors
#[derive(Error, Debug)]
pub enum GrindError {
    /// The search tool is missing or unusable. Not the user's fault.
    #[error("Search tool unavailable: {0}")]
    Configuration(String),

    /// The tool ran and reported a failure
    #[error("Search tool failed: {0}")]
    ToolExecution(String),

    /// The tool exited cleanly without writing a keypair
    #[error("Search tool exited without producing a keypair")]
    NoKeypairProduced,
}

impl GrindError {
    /// Whether the error is the operator's to fix rather than the user's
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Result type alias for search operations
pub type GrindResult<T> = Result<T, GrindError>;
