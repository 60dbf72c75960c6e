//! Pattern Types
//!
//! Validated search patterns, risk tiers and rejection reasons.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The 58 characters an address may contain.
pub const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Characters people type by mistake because they look like Base58 ones.
pub const LOOKALIKE_CHARS: [char; 4] = ['0', 'O', 'I', 'l'];

/// Longest prefix or suffix the validator accepts.
pub const MAX_SIDE_LEN: usize = 8;

/// Longest combined pattern that is ever searched for.
pub const MAX_COMBINED_LEN: usize = 8;

/// Longest combined pattern that starts without confirmation.
pub const FAST_TIER_MAX_LEN: usize = 4;

/// Check whether a character belongs to the Base58 alphabet
pub fn is_base58(c: char) -> bool {
    BASE58_ALPHABET.contains(c)
}

/// Where the pattern has to appear in the address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    StartsWith,
    EndsWith,
    StartsAndEndsWith,
}

impl MatchMode {
    /// Whether this mode constrains a single side of the address
    pub fn is_single_sided(&self) -> bool {
        !matches!(self, Self::StartsAndEndsWith)
    }
}

impl std::fmt::Display for MatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartsWith => write!(f, "starts with"),
            Self::EndsWith => write!(f, "ends with"),
            Self::StartsAndEndsWith => write!(f, "starts and ends with"),
        }
    }
}

/// A validated pattern. Only the validator constructs these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSpec {
    mode: MatchMode,
    prefix: String,
    suffix: String,
    case_sensitive: bool,
}

impl PatternSpec {
    pub(crate) fn new(
        mode: MatchMode,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
        case_sensitive: bool,
    ) -> Self {
        Self {
            mode,
            prefix: prefix.into(),
            suffix: suffix.into(),
            case_sensitive,
        }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Number of constrained characters across both sides
    pub fn combined_len(&self) -> usize {
        self.prefix.chars().count() + self.suffix.chars().count()
    }

    /// Risk tier of this pattern; validated specs always have one
    pub fn risk_tier(&self) -> RiskTier {
        RiskTier::classify(self.combined_len()).unwrap_or(RiskTier::Slow)
    }
}

impl std::fmt::Display for PatternSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.prefix.is_empty(), self.suffix.is_empty()) {
            (false, true) => write!(f, "{}…", self.prefix),
            (true, false) => write!(f, "…{}", self.suffix),
            _ => write!(f, "{}…{}", self.prefix, self.suffix),
        }
    }
}

/// How expensive a pattern is expected to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    /// 1-4 characters, starts immediately
    Fast,
    /// 5-8 characters, needs explicit confirmation
    Slow,
}

impl RiskTier {
    /// Classify a combined pattern length; `None` means the length is never accepted
    pub fn classify(combined_len: usize) -> Option<Self> {
        match combined_len {
            1..=FAST_TIER_MAX_LEN => Some(Self::Fast),
            n if n > FAST_TIER_MAX_LEN && n <= MAX_COMBINED_LEN => Some(Self::Slow),
            _ => None,
        }
    }

    pub fn requires_confirmation(&self) -> bool {
        matches!(self, Self::Slow)
    }
}

/// Which kind of disallowed character was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidCharClass {
    /// One of `0`, `O`, `I`, `l`
    Lookalike,
    /// Anything else outside the alphabet
    NotBase58,
}

/// Why a pattern or intent was refused
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("Invalid character '{ch}', please use only Base58 characters: {alphabet}", alphabet = BASE58_ALPHABET)]
    InvalidCharacter { ch: char, class: InvalidCharClass },

    #[error("Pattern is empty")]
    Empty,

    #[error("Pattern should be between 1-{max} characters long, got {len}", max = MAX_SIDE_LEN)]
    TooLong { len: usize },

    #[error("Prefix and suffix should be between 0-{max} characters each", max = MAX_SIDE_LEN)]
    SideTooLong { prefix_len: usize, suffix_len: usize },

    #[error("Combined pattern length {len} exceeds the {max} character limit", max = MAX_COMBINED_LEN)]
    CombinedTooLong { len: usize },

    #[error("Invalid input for start and end patterns, use the format prefix,suffix (e.g. ABC,XYZ)")]
    Malformed,

    #[error("Cannot tell whether '{text}' is a prefix or a suffix, use the format prefix,suffix")]
    AmbiguousSide { text: String },

    #[error("Please select a pattern placement option first")]
    NoModeSelected,

    #[error("There is no pending pattern to confirm")]
    NothingToConfirm,

    #[error("No generation is running")]
    NotGenerating,

    #[error("Please add your question")]
    EmptyQuestion,
}

impl RejectionReason {
    /// Build the rejection for a character outside the alphabet
    pub fn invalid_char(ch: char) -> Self {
        let class = if LOOKALIKE_CHARS.contains(&ch) {
            InvalidCharClass::Lookalike
        } else {
            InvalidCharClass::NotBase58
        };
        Self::InvalidCharacter { ch, class }
    }
}
