//! Field validation for record drafts.
//!
//! Every check runs synchronously before any store is touched. A failed
//! check names the offending field by its document key so forms can
//! attach the message inline.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;

use super::icons;

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^#[0-9A-F]{6}$").expect("hex color pattern is valid")
});

/// Why a field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    /// Field is missing, empty, or whitespace only.
    Required,
    /// Amount must be strictly greater than zero.
    NotPositive,
    /// Value must not be negative.
    Negative,
    /// Text is shorter than the minimum number of characters.
    TooShort { min: usize },
    /// Integer outside an inclusive range.
    OutOfRange { min: i64, max: i64 },
    /// Icon name is not part of the catalog.
    UnknownIcon,
    /// Color is not a `#RRGGBB` hex string.
    InvalidColor,
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "field is required"),
            Self::NotPositive => write!(f, "must be greater than zero"),
            Self::Negative => write!(f, "must not be negative"),
            Self::TooShort { min } => write!(f, "must have at least {min} characters"),
            Self::OutOfRange { min, max } => write!(f, "must be between {min} and {max}"),
            Self::UnknownIcon => write!(f, "is not a known icon"),
            Self::InvalidColor => write!(f, "must be a #RRGGBB hex color"),
        }
    }
}

/// A rejected draft, tagged with the field that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid `{field}`: {reason}")]
pub struct ValidationError {
    /// Document key of the offending field.
    pub field: &'static str,
    /// What was wrong with it.
    pub reason: ValidationReason,
}

impl ValidationError {
    pub const fn new(field: &'static str, reason: ValidationReason) -> Self {
        Self { field, reason }
    }
}

pub fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, ValidationReason::Required));
    }
    Ok(())
}

/// Trimmed text with at least `min` characters (not bytes).
pub fn require_min_chars(
    field: &'static str,
    value: &str,
    min: usize,
) -> Result<(), ValidationError> {
    require_text(field, value)?;
    if value.trim().chars().count() < min {
        return Err(ValidationError::new(field, ValidationReason::TooShort { min }));
    }
    Ok(())
}

pub fn require_positive(field: &'static str, value: Decimal) -> Result<(), ValidationError> {
    if value <= Decimal::ZERO {
        return Err(ValidationError::new(field, ValidationReason::NotPositive));
    }
    Ok(())
}

pub fn require_non_negative(
    field: &'static str,
    value: Option<Decimal>,
) -> Result<(), ValidationError> {
    match value {
        Some(v) if v < Decimal::ZERO => {
            Err(ValidationError::new(field, ValidationReason::Negative))
        }
        _ => Ok(()),
    }
}

pub fn require_range(
    field: &'static str,
    value: i64,
    min: i64,
    max: i64,
) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::new(field, ValidationReason::OutOfRange { min, max }));
    }
    Ok(())
}

pub fn require_icon(field: &'static str, value: &str) -> Result<(), ValidationError> {
    require_text(field, value)?;
    if !icons::is_known(value) {
        return Err(ValidationError::new(field, ValidationReason::UnknownIcon));
    }
    Ok(())
}

pub fn require_hex_color(field: &'static str, value: &str) -> Result<(), ValidationError> {
    require_text(field, value)?;
    if !HEX_COLOR.is_match(value) {
        return Err(ValidationError::new(field, ValidationReason::InvalidColor));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_whitespace_only_text_is_required() {
        let err = require_text("name", "   ").unwrap_err();
        assert_eq!(err.field, "name");
        assert_eq!(err.reason, ValidationReason::Required);
    }

    #[test]
    fn test_min_chars_counts_characters_not_bytes() {
        assert!(require_min_chars("name", "Çé", 2).is_ok());
        assert_eq!(
            require_min_chars("name", " a ", 2).unwrap_err().reason,
            ValidationReason::TooShort { min: 2 }
        );
    }

    #[test]
    fn test_positive_rejects_zero_and_negative() {
        assert!(require_positive("valor", dec!(0.01)).is_ok());
        assert!(require_positive("valor", Decimal::ZERO).is_err());
        assert!(require_positive("valor", dec!(-3)).is_err());
    }

    #[test]
    fn test_non_negative_allows_absent_and_zero() {
        assert!(require_non_negative("balance", None).is_ok());
        assert!(require_non_negative("balance", Some(Decimal::ZERO)).is_ok());
        assert!(require_non_negative("balance", Some(dec!(-0.5))).is_err());
    }

    #[test]
    fn test_range_is_inclusive() {
        assert!(require_range("dueDay", 1, 1, 31).is_ok());
        assert!(require_range("dueDay", 31, 1, 31).is_ok());
        assert!(require_range("dueDay", 0, 1, 31).is_err());
        assert!(require_range("dueDay", 32, 1, 31).is_err());
    }

    #[test]
    fn test_hex_color_is_case_insensitive() {
        assert!(require_hex_color("color", "#10B981").is_ok());
        assert!(require_hex_color("color", "#10b981").is_ok());
        assert_eq!(
            require_hex_color("color", "blue").unwrap_err().reason,
            ValidationReason::InvalidColor
        );
        assert!(require_hex_color("color", "#10B98").is_err());
        assert!(require_hex_color("color", "#10B9811").is_err());
    }

    #[test]
    fn test_icon_must_be_in_catalog() {
        assert!(require_icon("icon", "Wallet").is_ok());
        assert_eq!(
            require_icon("icon", "wallet").unwrap_err().reason,
            ValidationReason::UnknownIcon
        );
        assert_eq!(
            require_icon("icon", "").unwrap_err().reason,
            ValidationReason::Required
        );
    }

    #[test]
    fn test_error_message_names_field() {
        let err = ValidationError::new("dueDay", ValidationReason::OutOfRange { min: 1, max: 31 });
        assert_eq!(err.to_string(), "invalid `dueDay`: must be between 1 and 31");
    }
}
