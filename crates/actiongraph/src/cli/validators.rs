//! CLI input validation functions.
//!
//! Used by clap's `value_parser` attribute so bad input is rejected at parse
//! time, before any workspace is opened.

use crate::domain::{ActionId, MAX_TEXT_LENGTH, MAX_TITLE_LENGTH};

/// Validate an ID prefix, delegating to the rule `init` enforces.
pub fn validate_prefix(s: &str) -> Result<String, String> {
    use crate::commands::init;

    let trimmed = s.trim();
    init::validate_prefix(trimmed).map_err(|e| e.to_string())?;
    Ok(trimmed.to_string())
}

/// Validate an action ID.
pub fn validate_action_id(s: &str) -> Result<ActionId, String> {
    ActionId::parse(s)
}

/// Validate an action title: non-blank and at most `MAX_TITLE_LENGTH` chars.
pub fn validate_title(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("Title cannot be empty".to_string());
    }
    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(format!(
            "Title cannot exceed {MAX_TITLE_LENGTH} characters"
        ));
    }
    Ok(trimmed.to_string())
}

/// Validate a description or vision text.
pub fn validate_text(s: &str) -> Result<String, String> {
    if s.chars().count() > MAX_TEXT_LENGTH {
        return Err(format!("Text cannot exceed {MAX_TEXT_LENGTH} characters"));
    }
    Ok(s.to_string())
}
