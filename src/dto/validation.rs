//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest team name accepted, in characters.
pub const MAX_TEAM_NAME_CHARS: usize = 40;

/// Validates that a team name is non-blank once trimmed and not overly long.
///
/// # Examples
///
/// ```ignore
/// validate_team_name("Red Foxes") // Ok
/// validate_team_name("   ")       // Err - blank
/// ```
pub fn validate_team_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("team_name_blank");
        err.message = Some("Team name must not be blank".into());
        return Err(err);
    }

    let length = trimmed.chars().count();
    if length > MAX_TEAM_NAME_CHARS {
        let mut err = ValidationError::new("team_name_length");
        err.message = Some(
            format!("Team name must be at most {MAX_TEAM_NAME_CHARS} characters (got {length})")
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
    fn test_validate_team_name_valid() {
        assert!(validate_team_name("Red Foxes").is_ok());
        assert!(validate_team_name("  Зелені  ").is_ok());
    }

    #[test]
    fn test_validate_team_name_blank() {
        assert!(validate_team_name("").is_err());
        assert!(validate_team_name(" \t ").is_err());
    }

    #[test]
    fn test_validate_team_name_too_long() {
        assert!(validate_team_name(&"x".repeat(MAX_TEAM_NAME_CHARS)).is_ok());
        assert!(validate_team_name(&"x".repeat(MAX_TEAM_NAME_CHARS + 1)).is_err());
    }
}
