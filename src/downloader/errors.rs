// Error types for the resolution and streaming pipeline

use serde::Serialize;

/// Coarse error classes. Each class owns exactly one HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    UpstreamResolution,
    FormatNotFound,
    UnsupportedFormat,
    Probe,
    Streaming,
    Transcoder,
    ToolUnavailable,
}

impl ErrorKind {
    /// Status code table used by the HTTP layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::FormatNotFound => 400,
            Self::UnsupportedFormat => 400,
            Self::UpstreamResolution => 500,
            Self::Probe => 500,
            Self::Streaming => 500,
            Self::Transcoder => 500,
            Self::ToolUnavailable => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::UpstreamResolution => "upstream_resolution",
            Self::FormatNotFound => "format_not_found",
            Self::UnsupportedFormat => "unsupported_format",
            Self::Probe => "probe",
            Self::Streaming => "streaming",
            Self::Transcoder => "transcoder",
            Self::ToolUnavailable => "tool_unavailable",
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DownloadError {
    /// Query parameters failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// The source could not be resolved (unreachable, private, unparseable)
    #[error("Upstream resolution failed: {0}")]
    UpstreamResolution(String),

    /// The requested identifier is not among the resolved encodings
    #[error("Format not found: {0}")]
    FormatNotFound(String),

    /// The encoding does not carry both audio and video
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Size lookup failed (always absorbed by the enricher)
    #[error("Size probe failed: {0}")]
    Probe(String),

    /// Relaying media bytes failed
    #[error("Streaming error: {0}")]
    Streaming(String),

    /// The audio transcoder could not start or failed
    #[error("Transcoder error: {0}")]
    Transcoder(String),

    /// yt-dlp, python or ffmpeg is not installed
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::UpstreamResolution(_) => ErrorKind::UpstreamResolution,
            Self::FormatNotFound(_) => ErrorKind::FormatNotFound,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::Probe(_) => ErrorKind::Probe,
            Self::Streaming(_) => ErrorKind::Streaming,
            Self::Transcoder(_) => ErrorKind::Transcoder,
            Self::ToolNotFound(_) => ErrorKind::ToolUnavailable,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        Self::Streaming(e.to_string())
    }
}
