//! Exit code constants for the specsmith CLI.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments, configuration or input text |
//! | 9 | `LOCK_HELD` | The trace's writer lock could not be acquired |
//! | 65 | `GENERATION_FAILED` | A stage exhausted its retries |
//! | 66 | `SCHEMA_REJECTED` | Final schema check failed under `enforce` |
//! | 70 | `LLM_FAILURE` | The LLM backend failed |
//! | 74 | `STORAGE_FAILURE` | Version history could not be written or read |

/// Exit codes matching the documented exit code table.
///
/// Use the named constants for common exit codes, or [`as_i32()`](Self::as_i32)
/// to get the numeric value for `std::process::exit()`.
///
/// # Example
///
/// ```rust
/// use specsmith_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::GENERATION_FAILED, ExitCode::from_i32(65));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - operation completed successfully
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid arguments, configuration or input text
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Lock held - the trace writer lock could not be taken
    pub const LOCK_HELD: ExitCode = ExitCode(9);

    /// Generation failed - a stage returned no valid output within its retries
    pub const GENERATION_FAILED: ExitCode = ExitCode(65);

    /// Schema rejected - the assembled specification failed the enforced schema
    pub const SCHEMA_REJECTED: ExitCode = ExitCode(66);

    /// LLM failure - transport, auth, quota or budget failure
    pub const LLM_FAILURE: ExitCode = ExitCode(70);

    /// Storage failure - the versioned store could not be read or written
    pub const STORAGE_FAILURE: ExitCode = ExitCode(74);

    /// Get the numeric exit code value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an ExitCode from a raw i32 value.
    ///
    /// Prefer using the named constants when possible.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}
