use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors produced by the dubbing pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum DubError {
    #[error("{kind} file not found: {}", path.display())]
    MissingAsset { kind: &'static str, path: PathBuf },

    #[error("failed to probe {}: {reason}", path.display())]
    Probe { path: PathBuf, reason: String },

    #[error("ffmpeg failed (exit code {code:?}): {stderr}")]
    Encode { code: Option<i32>, stderr: String },

    #[error("invalid {what}: {value} (must be a finite number greater than zero)")]
    InvalidDuration { what: &'static str, value: f64 },

    #[error("invalid background volume: {0} (must be a finite number >= 0)")]
    InvalidVolume(f64),

    #[error("could not start {tool}: {source}")]
    ToolUnavailable {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} timed out after {after:?}")]
    Timeout { tool: String, after: Duration },

    #[error("{tool} was cancelled")]
    Cancelled { tool: String },

    #[error("model {0} not found or not running")]
    ModelNotFound(String),

    #[error("video {0} not found")]
    VideoNotFound(String),

    #[error("voice {0} not found")]
    Voice(String),

    #[error("speech synthesis failed: {0}")]
    Tts(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DubError>;
