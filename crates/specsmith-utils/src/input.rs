//! Inbound text validation for requirements and refinement instructions.

use crate::error::InputError;

pub const REQUIREMENTS_MIN_CHARS: usize = 50;
pub const REQUIREMENTS_MAX_CHARS: usize = 10_000;
pub const REFINEMENT_MIN_CHARS: usize = 10;
pub const REFINEMENT_MAX_CHARS: usize = 2_000;

/// Trim and bound-check a requirements text. Returns the trimmed text.
pub fn validate_requirements(text: &str) -> Result<String, InputError> {
    bounded(
        "requirements text",
        text,
        REQUIREMENTS_MIN_CHARS,
        REQUIREMENTS_MAX_CHARS,
    )
}

/// Trim and bound-check a refinement instruction. Returns the trimmed text.
pub fn validate_refinement(text: &str) -> Result<String, InputError> {
    bounded(
        "refinement text",
        text,
        REFINEMENT_MIN_CHARS,
        REFINEMENT_MAX_CHARS,
    )
}

fn bounded(
    field: &'static str,
    text: &str,
    minimum: usize,
    maximum: usize,
) -> Result<String, InputError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(InputError::Empty { field });
    }

    // Bounds count characters, not bytes.
    let actual = trimmed.chars().count();
    if actual < minimum {
        return Err(InputError::TooShort {
            field,
            actual,
            minimum,
        });
    }
    if actual > maximum {
        return Err(InputError::TooLong {
            field,
            actual,
            maximum,
        });
    }

    Ok(trimmed.to_string())
}
