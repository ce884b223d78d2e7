//! Crate-level error type.

use thiserror::Error;

/// Errors that can occur in the session pipeline.
///
/// Each variant carries enough context to diagnose the failure without
/// needing to inspect the originating error directly.
#[derive(Debug, Error)]
pub enum PanelflowError {
    /// The remote server replied with a non-2xx HTTP status code.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// A TCP-level connection could not be established.
    #[error("connection failed to {url}: {detail}")]
    Connect { url: String, detail: String },

    /// Response body could not be parsed as the expected JSON structure.
    #[error("JSON parse error: {detail}")]
    Json { detail: String },

    /// The websocket connection failed or was torn down unexpectedly.
    #[error("websocket error: {0}")]
    Socket(String),

    /// The server refused a discussion request (start/intervene already running,
    /// unknown room, ...). Recoverable: the caller may retry.
    #[error("discussion request rejected: {0}")]
    Rejected(String),

    /// The client configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Synthesized-speech playback failed.
    #[error("audio playback error: {0}")]
    Audio(String),
}

impl PanelflowError {
    /// Classify a reqwest failure against the URL it was aimed at.
    pub fn from_request(url: &str, err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            PanelflowError::Connect {
                url: url.to_string(),
                detail: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            PanelflowError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            }
        } else {
            PanelflowError::Json {
                detail: err.to_string(),
            }
        }
    }
}
