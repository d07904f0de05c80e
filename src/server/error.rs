//! Error-to-HTTP response conversion.
//!
//! Handlers return `Result<T, ApiError>`; the body is always `{"message"}`
//! with a client-facing text per error kind. Details stay in the logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::config::ValidationStatus;
use crate::downloader::{DownloadError, ErrorKind};

pub struct ApiError {
    inner: DownloadError,
    validation_status: ValidationStatus,
}

impl ApiError {
    pub fn new(inner: DownloadError, validation_status: ValidationStatus) -> Self {
        Self {
            inner,
            validation_status,
        }
    }

    pub fn status(&self) -> StatusCode {
        let code = match self.inner.kind() {
            ErrorKind::Validation => self.validation_status.status_code(),
            kind => kind.status_code(),
        };
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn message(&self) -> &'static str {
        match self.inner.kind() {
            ErrorKind::Validation => "Invalid request parameters.",
            ErrorKind::UpstreamResolution => "Could not retrieve the video information.",
            ErrorKind::FormatNotFound => "Video format not found.",
            ErrorKind::UnsupportedFormat => "Video format does not carry audio and video together.",
            ErrorKind::Transcoder => "Error while converting the audio.",
            ErrorKind::Probe | ErrorKind::Streaming | ErrorKind::ToolUnavailable => {
                "Error while downloading the video."
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.inner.kind().as_str();

        if status.is_server_error() {
            tracing::error!(status = %status, kind, error = %self.inner, "request failed");
        } else {
            tracing::warn!(status = %status, kind, error = %self.inner, "request rejected");
        }

        (status, axum::Json(json!({ "message": self.message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn validation_status_is_configurable() {
        let err = ApiError::new(DownloadError::Validation("url".into()), ValidationStatus::BadRequest);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = ApiError::new(DownloadError::Validation("url".into()), ValidationStatus::InternalError);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        // Only validation errors follow the setting
        let err = ApiError::new(DownloadError::FormatNotFound("18".into()), ValidationStatus::InternalError);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn body_hides_internal_details() {
        let err = ApiError::new(
            DownloadError::UpstreamResolution(
                "ERROR: [youtube] abc: Sign in to confirm you're not a bot".into(),
            ),
            ValidationStatus::default(),
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Could not retrieve the video information.");
        assert!(!bytes.windows(3).any(|w| w == b"bot"));
    }
}
