//! File I/O utilities.

use crate::{AgentError, Result};
use std::path::Path;
use tokio::fs;

/// Read a document asynchronously.
///
/// # Errors
///
/// Returns `AgentError::Validation` if the path does not exist, and `AgentError::Io` for
/// any other read failure (these always bubble up).
pub async fn read_document(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    validate_file_exists(path)?;
    fs::read(path).await.map_err(AgentError::Io)
}

/// Validate that a file exists and is a regular file.
///
/// # Errors
///
/// Returns `AgentError::Validation` if it does not.
pub fn validate_file_exists(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(AgentError::validation(format!(
            "File does not exist: {}",
            path.display()
        )));
    }
    Ok(())
}
