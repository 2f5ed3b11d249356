// ABOUTME: Structured image pull progress records.
// ABOUTME: Decoding is best-effort; a malformed line becomes an empty record.

use crate::runtime::ClientError;
use bytes::Bytes;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ProgressDetail {
    #[serde(default, alias = "Current")]
    pub current: i64,
    #[serde(default, alias = "Total")]
    pub total: i64,
}

/// One line of the daemon's pull progress stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImagePullPayload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress: String,
    #[serde(default, rename = "progressDetail")]
    pub progress_detail: ProgressDetail,
    #[serde(default)]
    pub error: String,
}

impl ImagePullPayload {
    /// Decode one progress line.
    ///
    /// A line that is not a valid record yields the default payload and a
    /// warning; the stream carries on.
    pub fn from_line(line: &[u8]) -> Self {
        match serde_json::from_slice(line.trim_ascii()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    error = %e,
                    line = %String::from_utf8_lossy(line).trim_end(),
                    "malformed pull progress line"
                );
                Self::default()
            }
        }
    }

    /// A record standing in for a pull that failed part way.
    pub fn failed(error: &ClientError) -> Self {
        let error = match error {
            ClientError::Stream(message) => message.clone(),
            other => other.to_string(),
        };
        Self {
            error,
            ..Self::default()
        }
    }

    /// Whether the daemon reported the pull as failed.
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Whether this payload carries any decoded field.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Line mapper for the pull stream: blank lines are dropped.
pub(crate) fn parse_progress_line(line: Bytes) -> Option<ImagePullPayload> {
    if line.trim_ascii().is_empty() {
        return None;
    }
    Some(ImagePullPayload::from_line(&line))
}
