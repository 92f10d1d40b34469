//! Input validation shared by the server's request/response path and the
//! client's inline form checks.
//!
//! All rules operate on the *trimmed* input and return the trimmed string on
//! success so callers never persist surrounding whitespace.

use crate::constants::{
    CHANNEL_NAME_MAX, CHANNEL_NAME_MIN, MESSAGE_CONTENT_MAX, MESSAGE_CONTENT_MIN,
};
use crate::error::ValidationError;

fn trimmed(
    raw: &str,
    label: &'static str,
    min: usize,
    max: usize,
) -> Result<String, ValidationError> {
    let value = raw.trim();
    let len = value.chars().count();

    if len < min {
        return Err(ValidationError::TooShort { label, min });
    }
    if len > max {
        return Err(ValidationError::TooLong { label, max });
    }

    Ok(value.to_string())
}

/// Validate a channel name (1-20 characters after trimming).
pub fn channel_name(raw: &str) -> Result<String, ValidationError> {
    trimmed(raw, "Channel name", CHANNEL_NAME_MIN, CHANNEL_NAME_MAX)
}

/// Validate message content (1-2000 characters after trimming).
pub fn message_content(raw: &str) -> Result<String, ValidationError> {
    trimmed(raw, "Message", MESSAGE_CONTENT_MIN, MESSAGE_CONTENT_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name_trims() {
        assert_eq!(channel_name("  random  ").unwrap(), "random");
    }

    #[test]
    fn test_channel_name_empty_after_trim() {
        let err = channel_name("   ").unwrap_err();
        assert_eq!(
            err,
            ValidationError::TooShort {
                label: "Channel name",
                min: 1
            }
        );
        assert_eq!(err.to_string(), "Channel name must be at least 1 characters");
    }

    #[test]
    fn test_channel_name_too_long() {
        let err = channel_name(&"x".repeat(21)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TooLong {
                label: "Channel name",
                max: 20
            }
        );
    }

    #[test]
    fn test_message_content_bounds() {
        assert!(message_content("hi").is_ok());
        assert!(message_content(&"a".repeat(2000)).is_ok());
        assert!(message_content(&"a".repeat(2001)).is_err());
        assert!(message_content("").is_err());
    }

    #[test]
    fn test_length_counts_chars_not_bytes() {
        // 20 multi-byte characters are still a valid channel name.
        assert!(channel_name(&"é".repeat(20)).is_ok());
    }
}
