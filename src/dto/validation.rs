//! Validation helpers for DTOs.

use validator::ValidationError;

/// Number of characters in a session code.
pub const SESSION_CODE_LENGTH: usize = 7;
/// Digits drawn for the numeric positions.
pub const CODE_DIGITS: &[u8] = b"0123456789";
/// Letters drawn for the alphabetic positions; ambiguous glyphs (I, O) are
/// excluded so codes stay easy to read aloud.
pub const CODE_LETTERS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
/// Symbols eligible for the single symbol position.
pub const CODE_SYMBOLS: &[u8] = b"!@#$%&*";

/// Validates that a value has the shape of a session code: 7 characters,
/// 3 digits, 3 letters from the reduced alphabet, and exactly 1 symbol.
///
/// # Examples
///
/// ```ignore
/// validate_session_code("1A2#B3C") // Ok
/// validate_session_code("1a2#b3c") // Err - lowercase
/// validate_session_code("123ABCD") // Err - no symbol
/// ```
pub fn validate_session_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != SESSION_CODE_LENGTH {
        let mut err = ValidationError::new("session_code_length");
        err.message = Some(
            format!(
                "session code must be exactly {SESSION_CODE_LENGTH} characters (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    let digits = code.bytes().filter(|b| CODE_DIGITS.contains(b)).count();
    let letters = code.bytes().filter(|b| CODE_LETTERS.contains(b)).count();
    let symbols = code.bytes().filter(|b| CODE_SYMBOLS.contains(b)).count();

    if digits != 3 || letters != 3 || symbols != 1 {
        let mut err = ValidationError::new("session_code_format");
        err.message = Some(
            "session code must contain 3 digits, 3 letters, and 1 symbol".into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_session_code_valid() {
        assert!(validate_session_code("1A2#B3C").is_ok());
        assert!(validate_session_code("!9Z8Y7X").is_ok());
        assert!(validate_session_code("ABC123*").is_ok());
    }

    #[test]
    fn test_validate_session_code_invalid_length() {
        assert!(validate_session_code("1A2#B3").is_err()); // too short
        assert!(validate_session_code("1A2#B3C4").is_err()); // too long
        assert!(validate_session_code("").is_err()); // empty
    }

    #[test]
    fn test_validate_session_code_invalid_composition() {
        assert!(validate_session_code("1234ABC").is_err()); // no symbol
        assert!(validate_session_code("12##ABC").is_err()); // two symbols
        assert!(validate_session_code("1a2#b3c").is_err()); // lowercase letters
        assert!(validate_session_code("1I2#O3C").is_err()); // ambiguous letters
    }
}
