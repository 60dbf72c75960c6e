//! Pattern Validator
//!
//! Turns raw user text into a [`PatternSpec`] or a [`RejectionReason`].

use super::types::{
    is_base58, MatchMode, PatternSpec, RejectionReason, RiskTier, MAX_SIDE_LEN,
};

/// Validate raw pattern text for the given mode.
///
/// `side_hint` is the single-sided mode the user picked before switching to
/// [`MatchMode::StartsAndEndsWith`]. It decides which side a lone field
/// belongs to; without it a lone field is ambiguous.
pub fn validate(
    raw: &str,
    mode: MatchMode,
    side_hint: Option<MatchMode>,
    case_sensitive: bool,
) -> Result<PatternSpec, RejectionReason> {
    let text = raw.trim();

    let (prefix, suffix) = match mode {
        MatchMode::StartsWith => (validate_single(text)?, ""),
        MatchMode::EndsWith => ("", validate_single(text)?),
        MatchMode::StartsAndEndsWith => split_sides(text, side_hint)?,
    };

    if mode == MatchMode::StartsAndEndsWith {
        check_chars(prefix)?;
        check_chars(suffix)?;

        let prefix_len = prefix.chars().count();
        let suffix_len = suffix.chars().count();
        if prefix_len > MAX_SIDE_LEN || suffix_len > MAX_SIDE_LEN {
            return Err(RejectionReason::SideTooLong {
                prefix_len,
                suffix_len,
            });
        }
        if prefix_len + suffix_len == 0 {
            return Err(RejectionReason::Empty);
        }
    }

    let spec = PatternSpec::new(mode, prefix, suffix, case_sensitive);
    let len = spec.combined_len();
    if RiskTier::classify(len).is_none() {
        return Err(RejectionReason::CombinedTooLong { len });
    }

    Ok(spec)
}

fn validate_single(text: &str) -> Result<&str, RejectionReason> {
    check_chars(text)?;

    match text.chars().count() {
        0 => Err(RejectionReason::Empty),
        len if len > MAX_SIDE_LEN => Err(RejectionReason::TooLong { len }),
        _ => Ok(text),
    }
}

fn split_sides(text: &str, side_hint: Option<MatchMode>) -> Result<(&str, &str), RejectionReason> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();

    match parts.as_slice() {
        [prefix, suffix] => Ok((*prefix, *suffix)),
        [single] if single.is_empty() => Err(RejectionReason::Empty),
        [single] => match side_hint {
            Some(MatchMode::StartsWith) => Ok((*single, "")),
            Some(MatchMode::EndsWith) => Ok(("", *single)),
            _ => Err(RejectionReason::AmbiguousSide {
                text: single.to_string(),
            }),
        },
        _ => Err(RejectionReason::Malformed),
    }
}

fn check_chars(text: &str) -> Result<(), RejectionReason> {
    match text.chars().find(|c| !is_base58(*c)) {
        Some(ch) => Err(RejectionReason::invalid_char(ch)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::types::{InvalidCharClass, BASE58_ALPHABET};

    #[test]
    fn test_starts_with_accepts_short_pattern() {
        let spec = validate("AB", MatchMode::StartsWith, None, true).unwrap();
        assert_eq!(spec.prefix(), "AB");
        assert_eq!(spec.suffix(), "");
        assert_eq!(spec.combined_len(), 2);
        assert_eq!(spec.risk_tier(), RiskTier::Fast);
        assert!(spec.case_sensitive());
    }

    #[test]
    fn test_five_chars_needs_confirmation() {
        let spec = validate("ABCDE", MatchMode::StartsWith, None, true).unwrap();
        assert_eq!(spec.risk_tier(), RiskTier::Slow);
    }

    #[test]
    fn test_ends_with_trims_whitespace() {
        let spec = validate("  xyz \n", MatchMode::EndsWith, None, false).unwrap();
        assert_eq!(spec.suffix(), "xyz");
        assert!(!spec.case_sensitive());
    }

    #[test]
    fn test_lookalike_characters_rejected() {
        for bad in ["A0", "AO", "AI", "Al"] {
            let err = validate(bad, MatchMode::StartsWith, None, true).unwrap_err();
            assert!(
                matches!(err, RejectionReason::InvalidCharacter { class: InvalidCharClass::Lookalike, .. }),
                "{bad} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_non_base58_characters_rejected() {
        let err = validate("A+B", MatchMode::EndsWith, None, true).unwrap_err();
        assert_eq!(
            err,
            RejectionReason::InvalidCharacter {
                ch: '+',
                class: InvalidCharClass::NotBase58
            }
        );
    }

    #[test]
    fn test_invalid_character_wins_over_length() {
        let err = validate("ABCDEFGH0", MatchMode::StartsWith, None, true).unwrap_err();
        assert!(matches!(err, RejectionReason::InvalidCharacter { ch: '0', .. }));
    }

    #[test]
    fn test_single_side_length_limits() {
        assert_eq!(
            validate("", MatchMode::StartsWith, None, true).unwrap_err(),
            RejectionReason::Empty
        );
        assert_eq!(
            validate("ABCDEFGHJ", MatchMode::EndsWith, None, true).unwrap_err(),
            RejectionReason::TooLong { len: 9 }
        );
        assert!(validate("ABCDEFGH", MatchMode::EndsWith, None, true).is_ok());
    }

    #[test]
    fn test_both_sides_comma_delimited() {
        let spec = validate("AB, yz", MatchMode::StartsAndEndsWith, None, true).unwrap();
        assert_eq!(spec.prefix(), "AB");
        assert_eq!(spec.suffix(), "yz");
        assert_eq!(spec.combined_len(), 4);
    }

    #[test]
    fn test_both_sides_allows_one_empty_field() {
        let spec = validate("ABC,", MatchMode::StartsAndEndsWith, None, true).unwrap();
        assert_eq!(spec.prefix(), "ABC");
        assert_eq!(spec.suffix(), "");
    }

    #[test]
    fn test_single_field_uses_side_hint() {
        let spec = validate(
            "ABC",
            MatchMode::StartsAndEndsWith,
            Some(MatchMode::StartsWith),
            true,
        )
        .unwrap();
        assert_eq!(spec.prefix(), "ABC");

        let spec = validate(
            "ABC",
            MatchMode::StartsAndEndsWith,
            Some(MatchMode::EndsWith),
            true,
        )
        .unwrap();
        assert_eq!(spec.suffix(), "ABC");
    }

    #[test]
    fn test_single_field_without_hint_is_ambiguous() {
        let err = validate("ABC", MatchMode::StartsAndEndsWith, None, true).unwrap_err();
        assert_eq!(
            err,
            RejectionReason::AmbiguousSide {
                text: "ABC".to_string()
            }
        );
    }

    #[test]
    fn test_both_sides_limits() {
        assert_eq!(
            validate("A,B,C", MatchMode::StartsAndEndsWith, None, true).unwrap_err(),
            RejectionReason::Malformed
        );
        assert_eq!(
            validate(",", MatchMode::StartsAndEndsWith, None, true).unwrap_err(),
            RejectionReason::Empty
        );
        assert_eq!(
            validate("ABCDEFGHJ,a", MatchMode::StartsAndEndsWith, None, true).unwrap_err(),
            RejectionReason::SideTooLong {
                prefix_len: 9,
                suffix_len: 1
            }
        );
        assert_eq!(
            validate("ABCDE,abcde", MatchMode::StartsAndEndsWith, None, true).unwrap_err(),
            RejectionReason::CombinedTooLong { len: 10 }
        );
        let spec = validate("ABCD,abcd", MatchMode::StartsAndEndsWith, None, true).unwrap();
        assert_eq!(spec.risk_tier(), RiskTier::Slow);
    }

    #[test]
    fn test_accepted_specs_only_contain_alphabet_chars() {
        let inputs = [
            ("1", MatchMode::StartsWith),
            ("zzzz", MatchMode::EndsWith),
            ("9A,km", MatchMode::StartsAndEndsWith),
            ("HJKLMNPQ", MatchMode::StartsWith),
        ];
        for (raw, mode) in inputs {
            let spec = validate(raw, mode, None, true).unwrap();
            assert!(spec
                .prefix()
                .chars()
                .chain(spec.suffix().chars())
                .all(|c| BASE58_ALPHABET.contains(c)));
        }
    }
}
