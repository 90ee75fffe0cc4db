//! Stable exit codes for `rlm` CLI commands.

use crate::error::Error;

/// Command succeeded.
pub const OK: i32 = 0;
/// Any failure without a more specific code (bad arguments, I/O, malformed output).
pub const FAILURE: i32 = 1;
/// The engine directory could not be found.
pub const ENGINE_NOT_FOUND: i32 = 3;
/// `deno` is not on `PATH`.
pub const MISSING_DEPENDENCY: i32 = 4;
/// The engine exited without writing its output file.
pub const ENGINE_FAILURE: i32 = 5;
/// The engine finished but reported an error.
pub const ENGINE_REPORTED_ERROR: i32 = 6;
/// The engine was killed after the configured timeout.
pub const TIMED_OUT: i32 = 7;

/// Exit code for a library error.
pub fn for_error(err: &Error) -> i32 {
    match err {
        Error::NotFound { .. } => ENGINE_NOT_FOUND,
        Error::MissingDependency { .. } => MISSING_DEPENDENCY,
        Error::EngineFailure { .. } => ENGINE_FAILURE,
        Error::EngineReportedError(_) => ENGINE_REPORTED_ERROR,
        Error::TimedOut { .. } => TIMED_OUT,
        Error::Config(_) | Error::Io { .. } | Error::Json { .. } | Error::Yaml { .. } => FAILURE,
    }
}
