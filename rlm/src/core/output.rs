//! Interpretation of the engine's output document.

use serde_json::Value;

use crate::error::{Error, Result};

/// Key the engine sets when it finished but could not answer.
pub const ERROR_KEY: &str = "error";

/// Return the document unchanged unless it carries an `error` field.
pub fn interpret_output(document: Value) -> Result<Value> {
    if let Some(error) = document.get(ERROR_KEY) {
        return Err(Error::EngineReportedError(error.clone()));
    }
    Ok(document)
}
