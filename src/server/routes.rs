// HTTP handlers for the /video endpoints
//
// Query parameters are validated before the downloader is touched.

use axum::body::Body;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use super::error::ApiError;
use super::AppContext;
use crate::downloader::utils::{content_disposition, validate_format_id, validate_source_url};
use crate::downloader::{DownloadError, MediaDownload, VideoInfoResponse};

#[derive(Debug, Deserialize)]
pub struct InfoQuery {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadVideoQuery {
    pub url: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadAudioQuery {
    pub url: Option<String>,
}

impl AppContext {
    fn reject(&self, e: DownloadError) -> ApiError {
        ApiError::new(e, self.config.server.validation_status)
    }
}

fn parse_query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, DownloadError> {
    query
        .map(|Query(q)| q)
        .map_err(|e| DownloadError::Validation(e.body_text()))
}

/// GET /video/info?url=
pub async fn video_info(
    State(ctx): State<AppContext>,
    query: Result<Query<InfoQuery>, QueryRejection>,
) -> Result<Json<VideoInfoResponse>, ApiError> {
    let q = parse_query(query).map_err(|e| ctx.reject(e))?;
    let url = validate_source_url(q.url.as_deref()).map_err(|e| ctx.reject(e))?;

    let info = ctx
        .downloader
        .video_info(url.as_str())
        .await
        .map_err(|e| ctx.reject(e))?;

    Ok(Json(info))
}

/// GET /video/download-video?url=&format=
pub async fn download_video(
    State(ctx): State<AppContext>,
    query: Result<Query<DownloadVideoQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let q = parse_query(query).map_err(|e| ctx.reject(e))?;
    let url = validate_source_url(q.url.as_deref()).map_err(|e| ctx.reject(e))?;
    let format = validate_format_id(q.format.as_deref()).map_err(|e| ctx.reject(e))?;

    let download = ctx
        .downloader
        .stream_video(url.as_str(), &format)
        .await
        .map_err(|e| ctx.reject(e))?;

    attachment(download).map_err(|e| ctx.reject(e))
}

/// GET /video/download-audio?url=
pub async fn download_audio(
    State(ctx): State<AppContext>,
    query: Result<Query<DownloadAudioQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let q = parse_query(query).map_err(|e| ctx.reject(e))?;
    let url = validate_source_url(q.url.as_deref()).map_err(|e| ctx.reject(e))?;

    let download = ctx
        .downloader
        .stream_audio(url.as_str())
        .await
        .map_err(|e| ctx.reject(e))?;

    attachment(download).map_err(|e| ctx.reject(e))
}

/// Streaming attachment response; the body is pulled as the client reads
fn attachment(download: MediaDownload) -> Result<Response, DownloadError> {
    let content_type = HeaderValue::from_str(&download.content_type)
        .map_err(|e| DownloadError::Streaming(format!("Invalid content type: {}", e)))?;
    let disposition = HeaderValue::from_str(&content_disposition(&download.filename))
        .map_err(|e| DownloadError::Streaming(format!("Invalid file name: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(download.body),
    )
        .into_response())
}
