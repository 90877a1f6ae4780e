//! Bot API token lookup in a JSON secrets file

use crate::error::{Result, ScoreError};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Read the token stored under `key` in a JSON object like
/// `{"pompfbot_token": "123:abc"}`
pub fn read_secret(path: &Path, key: &str) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ScoreError::Config(format!("cannot read secrets file {}: {}", path.display(), e))
    })?;
    let secrets: HashMap<String, Value> = serde_json::from_str(&content)?;

    match secrets.get(key) {
        Some(Value::String(token)) if !token.is_empty() => Ok(token.clone()),
        Some(_) => Err(ScoreError::Config(format!(
            "secret {} in {} is not a non-empty string",
            key,
            path.display()
        ))),
        None => Err(ScoreError::Config(format!(
            "secret {} not found in {}",
            key,
            path.display()
        ))),
    }
}
