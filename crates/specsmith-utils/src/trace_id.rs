//! Trace identifier generation and validation
//!
//! Trace ids name directories under `<state_dir>/traces/`, so caller-supplied
//! ids are validated strictly instead of being sanitized: a refinement must hit
//! exactly the trace the caller named.

use chrono::{DateTime, Utc};

use crate::error::TraceIdError;

/// Maximum accepted trace id length.
pub const MAX_TRACE_ID_LEN: usize = 128;

/// Generate a fresh trace id of the form `trace_<YYYYmmdd_HHMMSS>_<8 hex>`.
#[must_use]
pub fn generate_trace_id() -> String {
    trace_id_at(Utc::now())
}

/// Build a trace id for the given instant with a random suffix.
#[must_use]
pub fn trace_id_at(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("trace_{}_{}", now.format("%Y%m%d_%H%M%S"), &suffix[..8])
}

/// Validate a caller-supplied trace id.
///
/// Accepts only `[A-Za-z0-9._-]`, at most [`MAX_TRACE_ID_LEN`] characters,
/// no `..` sequence and no leading dot.
///
/// # Examples
///
/// ```
/// use specsmith_utils::trace_id::validate_trace_id;
///
/// assert!(validate_trace_id("trace_20240101_120000_deadbeef").is_ok());
/// assert!(validate_trace_id("../etc").is_err());
/// ```
pub fn validate_trace_id(id: &str) -> Result<&str, TraceIdError> {
    if id.is_empty() {
        return Err(TraceIdError::Empty);
    }

    let len = id.chars().count();
    if len > MAX_TRACE_ID_LEN {
        return Err(TraceIdError::TooLong {
            len,
            max: MAX_TRACE_ID_LEN,
        });
    }

    if let Some(ch) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(TraceIdError::InvalidCharacter { ch });
    }

    if id.contains("..") || id.starts_with('.') {
        return Err(TraceIdError::PathTraversal { id: id.to_string() });
    }

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_trace_id_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let id = trace_id_at(at);

        assert!(id.starts_with("trace_20240309_070501_"), "{id}");
        let suffix = id.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(generate_trace_id(), generate_trace_id());
    }

    #[test]
    fn test_rejects_unsafe_ids() {
        assert_eq!(validate_trace_id(""), Err(TraceIdError::Empty));
        assert!(matches!(
            validate_trace_id("a/b"),
            Err(TraceIdError::InvalidCharacter { ch: '/' })
        ));
        assert!(matches!(
            validate_trace_id("a\\b"),
            Err(TraceIdError::InvalidCharacter { .. })
        ));
        assert!(matches!(
            validate_trace_id("x..y"),
            Err(TraceIdError::PathTraversal { .. })
        ));
        assert!(matches!(
            validate_trace_id(".hidden"),
            Err(TraceIdError::PathTraversal { .. })
        ));
        assert!(matches!(
            validate_trace_id(&"a".repeat(129)),
            Err(TraceIdError::TooLong { len: 129, .. })
        ));
    }

    #[test]
    fn test_accepts_plain_ids() {
        for id in ["t1", "my-trace", "trace_20240101_000000_abcd1234", "v1.2"] {
            assert_eq!(validate_trace_id(id), Ok(id));
        }
    }

    proptest! {
        #[test]
        fn prop_generated_ids_validate(secs in 0i64..4_000_000_000) {
            let at = Utc.timestamp_opt(secs, 0).unwrap();
            let id = trace_id_at(at);
            prop_assert!(validate_trace_id(&id).is_ok());
        }
    }
}
