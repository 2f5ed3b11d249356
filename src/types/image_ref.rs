// ABOUTME: Validated image reference as given by the caller.
// ABOUTME: Kept verbatim for pull/create/remove; derives container name stems.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0:?}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

/// An image reference such as `alpine`, `alpine:3` or
/// `registry.local:5000/team/tool@sha256:...`.
///
/// The daemon resolves defaults (registry, `latest` tag) itself, so the
/// reference is passed through exactly as written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    raw: String,
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        if let Some(c) = input
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || "/:.-_@".contains(*c)))
        {
            return Err(ParseImageRefError::InvalidChar(c));
        }

        if input.starts_with(['/', ':', '@'])
            || input.ends_with(['/', ':', '@'])
            || input.contains("//")
            || input.matches('@').count() > 1
        {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        Ok(Self {
            raw: input.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// A string usable as the start of a container name.
    ///
    /// Container names only allow `[a-zA-Z0-9_.-]`, so path separators and
    /// tag/digest separators become underscores.
    pub fn container_name_stem(&self) -> String {
        self.raw.replace(['/', ':', '@'], "_")
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for ImageRef {
    type Err = ParseImageRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
