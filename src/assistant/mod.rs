//! Assistant
//!
//! Optional chat-completion service used for pattern ideas and free-form
//! questions. Its absence or failure never affects the search flow.

pub mod openai;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;

use crate::config::AssistantConfig;
use crate::pattern::{validate, MatchMode};

pub use openai::OpenAiAssistant;

/// Prompt used when the user asks for ideas without saying what they want
pub const DEFAULT_SUGGESTION_PROMPT: &str =
    "Suggest cool 1-5 character patterns (prioritize 1-2 characters) for a Solana wallet. Use Base58 characters.";

/// Assistant errors
#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Assistant is not configured")]
    NotConfigured,

    #[error("Assistant request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Assistant API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid assistant response: {0}")]
    InvalidResponse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for AssistantError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AssistantError::Timeout
        } else if err.is_connect() {
            AssistantError::ConnectionFailed(err.to_string())
        } else if err.is_decode() {
            AssistantError::InvalidResponse(err.to_string())
        } else {
            AssistantError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AssistantError {
    fn from(err: serde_json::Error) -> Self {
        AssistantError::InvalidResponse(err.to_string())
    }
}

impl From<url::ParseError> for AssistantError {
    fn from(err: url::ParseError) -> Self {
        AssistantError::InvalidConfig(format!("Invalid URL: {}", err))
    }
}

pub type AssistantResult<T> = Result<T, AssistantError>;

/// A service that proposes patterns and answers questions
#[async_trait]
pub trait AssistantService: Send + Sync {
    /// Raw candidate patterns for a free-text request, unfiltered
    async fn suggest_patterns(&self, prompt: &str) -> AssistantResult<Vec<String>>;

    /// Free-form answer to a user question
    async fn answer(&self, question: &str) -> AssistantResult<String>;
}

/// Build the configured service, if any
pub fn from_config(config: &AssistantConfig) -> AssistantResult<Option<Arc<dyn AssistantService>>> {
    if !config.is_enabled() {
        return Ok(None);
    }
    let service = OpenAiAssistant::new(config)?;
    Ok(Some(Arc::new(service)))
}

/// Split a comma-delimited reply into trimmed, non-empty entries
pub fn split_candidates(reply: &str) -> Vec<String> {
    reply
        .split([',', '\n'])
        .map(|s| s.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '`'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keep candidates that are valid patterns and pick at most `max` at random
pub fn pick_suggestions<R: Rng + ?Sized>(
    candidates: &[String],
    max: usize,
    rng: &mut R,
) -> Vec<String> {
    let mut valid: Vec<String> = Vec::new();
    for candidate in candidates {
        if validate(candidate, MatchMode::StartsWith, None, true).is_ok() && !valid.contains(candidate) {
            valid.push(candidate.clone());
        }
    }

    valid.choose_multiple(rng, max.min(valid.len())).cloned().collect()
}
