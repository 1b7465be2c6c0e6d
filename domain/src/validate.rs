//! Lightweight input validation helpers. Keep logic minimal and deterministic.

use crate::CoreError;

/// Longest name the service accepts, in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Validate a user name: non-blank and at most `MAX_NAME_LEN` characters.
///
/// Repositories store whatever they are given; this check belongs to the
/// service layer.
pub fn validate_user_name(s: &str) -> Result<(), CoreError> {
    if s.trim().is_empty() {
        return Err(CoreError::InvalidName("empty".into()));
    }
    if s.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::InvalidName("too long".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validation_basic() {
        assert!(validate_user_name("sample1").is_ok());
        assert!(validate_user_name("O'Brien; DROP TABLE users").is_ok());
        assert!(validate_user_name("").is_err());
        assert!(validate_user_name("   ").is_err());
    }

    #[test]
    fn name_length_counts_chars() {
        assert!(validate_user_name(&"é".repeat(MAX_NAME_LEN)).is_ok());
        assert!(validate_user_name(&"a".repeat(MAX_NAME_LEN + 1)).is_err());
    }
}
