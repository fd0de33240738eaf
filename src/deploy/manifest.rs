// ABOUTME: Local manifest checks run before any cluster call.
// ABOUTME: Every YAML document must be a mapping with apiVersion, kind, and metadata.

use serde::Deserialize;
use std::path::Path;

use crate::result::{ErrorCategory, StageError};

pub const REQUIRED_FIELDS: [&str; 3] = ["apiVersion", "kind", "metadata"];

fn invalid(path: &Path, message: String) -> StageError {
    StageError::new(ErrorCategory::Validation, message).with_target(path.display().to_string())
}

/// Validate the manifest at `path` and return how many documents it holds.
pub fn validate_manifest_file(path: &Path) -> Result<usize, StageError> {
    let meta = std::fs::metadata(path)
        .map_err(|_| invalid(path, format!("manifest file not found: {}", path.display())))?;
    if meta.is_dir() {
        return Err(invalid(
            path,
            format!("manifest path is a directory, not a file: {}", path.display()),
        ));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| invalid(path, format!("failed to read manifest {}: {e}", path.display())))?;

    let mut documents = 0;
    for (index, document) in serde_yaml::Deserializer::from_str(&content).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| invalid(path, format!("invalid YAML in manifest: {e}")))?;
        let position = index + 1;

        let mapping = match value {
            // Empty documents between separators are allowed.
            serde_yaml::Value::Null => continue,
            serde_yaml::Value::Mapping(mapping) => mapping,
            _ => {
                return Err(invalid(
                    path,
                    format!("manifest document {position} is not a mapping"),
                ));
            }
        };

        if let Some(field) = REQUIRED_FIELDS.iter().find(|f| !mapping.contains_key(**f)) {
            return Err(invalid(path, format!("manifest missing required field: {field}"))
                .with_context("field", *field)
                .with_context("document", position));
        }
        documents += 1;
    }

    if documents == 0 {
        return Err(invalid(path, format!("manifest is empty: {}", path.display())));
    }
    Ok(documents)
}
