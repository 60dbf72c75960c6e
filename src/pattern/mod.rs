//! Pattern Module
//!
//! Validation, risk classification and cost estimation for vanity patterns.

pub mod estimate;
pub mod types;
pub mod validator;

pub use estimate::{format_duration, DifficultyEstimator, Estimate};
pub use types::{
    is_base58, InvalidCharClass, MatchMode, PatternSpec, RejectionReason, RiskTier,
    BASE58_ALPHABET,
};
pub use validator::validate;
