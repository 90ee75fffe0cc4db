//! Error types for engine invocation.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Result type alias using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by locating, configuring, and running the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Neither the bundled nor the development engine directory exists.
    #[error(
        "cannot find the engine: no {marker} in {} or in any ancestor of {}; \
         ensure the package is installed correctly or run from the project root",
        .bundled.display(),
        .search_root.display()
    )]
    NotFound {
        marker: &'static str,
        bundled: PathBuf,
        search_root: PathBuf,
    },

    /// The runtime executable is not on the search path.
    #[error(
        "{program} is required but was not found on PATH.\n\
         Install it with:\n  \
         macOS/Linux: curl -fsSL https://deno.land/install.sh | sh\n  \
         Windows (PowerShell): irm https://deno.land/install.ps1 | iex"
    )]
    MissingDependency { program: String },

    /// The engine exited without writing its output file.
    #[error("engine failed (exit code {}){}", fmt_exit_code(.exit_code), fmt_stderr(.stderr))]
    EngineFailure {
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    /// The engine ran to completion but reported a logical failure.
    #[error("engine reported an error: {}", fmt_value(.0))]
    EngineReportedError(Value),

    /// The engine did not exit before the configured timeout.
    #[error("engine timed out after {timeout:?}")]
    TimedOut { timeout: Duration },

    /// Invalid configuration value or document shape.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{context}: {source}")]
    Yaml {
        context: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn yaml(context: impl Into<String>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            context: context.into(),
            source,
        }
    }
}

fn fmt_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none, terminated by signal".to_string(),
    }
}

fn fmt_stderr(stderr: &Option<String>) -> String {
    match stderr.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => format!("\n{text}"),
        _ => String::new(),
    }
}

/// Strings are shown without JSON quoting; everything else as compact JSON.
fn fmt_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
