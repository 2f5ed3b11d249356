// ABOUTME: Environment values for the container, literal or read from the host.
// ABOUTME: Resolved once at load time into KEY=VALUE entries.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;

/// A container environment value: a literal, or `{env: VAR, default: ...}`
/// to copy a host variable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromHost {
        env: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    pub fn resolve(&self) -> Result<String> {
        match self {
            EnvValue::Literal(value) => Ok(value.clone()),
            EnvValue::FromHost { env, default } => std::env::var(env)
                .ok()
                .or_else(|| default.clone())
                .ok_or_else(|| Error::MissingEnvVar(env.clone())),
        }
    }
}

/// Resolve a map into `KEY=VALUE` entries, sorted by key.
pub fn resolve_env_entries(map: &HashMap<String, EnvValue>) -> Result<Vec<String>> {
    let mut entries = map
        .iter()
        .map(|(key, value)| value.resolve().map(|v| format!("{key}={v}")))
        .collect::<Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

/// Parse a `KEY=VALUE` flag. A bare `KEY` copies the host's value.
pub fn parse_env_entry(entry: &str) -> Result<String> {
    match entry.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(Error::InvalidConfig(format!(
            "environment entry {entry:?} has no name"
        ))),
        Some(_) => Ok(entry.to_string()),
        None => EnvValue::FromHost {
            env: entry.to_string(),
            default: None,
        }
        .resolve()
        .map(|value| format!("{entry}={value}")),
    }
}
