//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest nickname a player may choose, in characters.
pub const MAX_NICKNAME_CHARS: usize = 64;

/// Validates that a text field contains something other than whitespace.
///
/// # Examples
///
/// ```ignore
/// validate_not_blank("Fredagspoker") // Ok
/// validate_not_blank("   ")          // Err
/// ```
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Validates a nickname: not blank and at most [`MAX_NICKNAME_CHARS`] characters once trimmed.
pub fn validate_nickname(nickname: &str) -> Result<(), ValidationError> {
    validate_not_blank(nickname)?;

    let length = nickname.trim().chars().count();
    if length > MAX_NICKNAME_CHARS {
        let mut err = ValidationError::new("nickname_length");
        err.message = Some(
            format!("Nickname must be at most {MAX_NICKNAME_CHARS} characters (got {length})")
                .into(),
        );
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("x").is_ok());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank(" \t ").is_err());
    }

    #[test]
    fn test_validate_nickname_length_counts_characters() {
        assert!(validate_nickname(&"ø".repeat(64)).is_ok()); // multi-byte but 64 chars
        assert!(validate_nickname(&"a".repeat(65)).is_err());
        assert!(validate_nickname(&format!("  {}  ", "a".repeat(64))).is_ok()); // trimmed
    }
}
