//! Dataset name validation
//!
//! Names appear in URLs, file paths and HKDF info strings, so they are
//! validated once at the boundary and treated as opaque afterwards.

use crate::error::{ProtocolError, Result};

/// Accept non-empty `[A-Za-z0-9_.-]+` that cannot traverse paths.
pub fn validate_dataset_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ProtocolError::InvalidDatasetName("empty name".to_string()));
    }
    if name == "." || name == ".." {
        return Err(ProtocolError::InvalidDatasetName(format!(
            "reserved name: {name:?}"
        )));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
    {
        return Err(ProtocolError::InvalidDatasetName(format!(
            "illegal character {bad:?} in {name:?}"
        )));
    }
    Ok(())
}
