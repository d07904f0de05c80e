// Downloader - composes extraction, enrichment, relay and transcoding
//
// Each call resolves the source afresh. Nothing is cached between requests.

use std::sync::Arc;

use super::errors::DownloadError;
use super::extractors::InfoExtractor;
use super::format_selector::FormatSelector;
use super::models::{MediaDownload, VideoInfoResponse};
use super::stream;
use super::transcoder::Transcoder;
use super::utils::{audio_filename, video_filename, with_upstream_headers};

/// Fallback content type when an encoding reports none
const DEFAULT_VIDEO_MIME: &str = "video/mp4";

pub struct Downloader {
    extractor: Arc<dyn InfoExtractor>,
    transcoder: Arc<dyn Transcoder>,
    selector: FormatSelector,
    http: reqwest::Client,
    site_name: String,
}

impl Downloader {
    pub fn new(
        extractor: Arc<dyn InfoExtractor>,
        transcoder: Arc<dyn Transcoder>,
        selector: FormatSelector,
        http: reqwest::Client,
        site_name: impl Into<String>,
    ) -> Self {
        Self {
            extractor,
            transcoder,
            selector,
            http,
            site_name: site_name.into(),
        }
    }

    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    /// Title, description, best thumbnail and enriched audio-bearing formats
    pub async fn video_info(&self, url: &str) -> Result<VideoInfoResponse, DownloadError> {
        tracing::info!(extractor = self.extractor.name(), url, "fetching video info");
        let metadata = self.extractor.resolve(url).await?;
        let formats = self.selector.enrich(&metadata.encodings, url).await;

        tracing::info!(
            url,
            encodings = metadata.encodings.len(),
            formats = formats.len(),
            "video info ready"
        );

        Ok(VideoInfoResponse {
            thumbnail_url: metadata.best_thumbnail().map(str::to_string),
            title: metadata.title,
            description: metadata.description,
            formats,
        })
    }

    /// Relay the combined audio+video encoding `format_id` of `url`.
    ///
    /// Every failure before the upstream media answers is returned as an
    /// error; once the body is handed out, failures abort the stream.
    pub async fn stream_video(&self, url: &str, format_id: &str) -> Result<MediaDownload, DownloadError> {
        let metadata = self.extractor.resolve(url).await?;

        let encoding = metadata.find_encoding(format_id).ok_or_else(|| {
            DownloadError::FormatNotFound(format!("{} is not offered for {}", format_id, url))
        })?;

        if !encoding.is_combined() {
            return Err(DownloadError::UnsupportedFormat(format!(
                "{} does not carry both audio and video",
                format_id
            )));
        }

        let response = with_upstream_headers(self.http.get(&encoding.media_url), &encoding.http_headers)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| DownloadError::Streaming(format!("upstream media request failed: {}", e)))?;

        let content_type = if encoding.mime_type.trim().is_empty() {
            DEFAULT_VIDEO_MIME.to_string()
        } else {
            encoding.mime_type.clone()
        };

        tracing::info!(url, format = format_id, content_type = %content_type, "relaying video");

        Ok(MediaDownload {
            content_type,
            filename: video_filename(&self.site_name, &metadata.title, &encoding.container),
            body: stream::from_response(response),
        })
    }

    /// Stream the extractor's best audio rendition of `url` transcoded to mp3
    pub async fn stream_audio(&self, url: &str) -> Result<MediaDownload, DownloadError> {
        let metadata = self.extractor.resolve(url).await?;

        let audio = self.extractor.open_audio_stream(url).await?;
        let transcoded = self.transcoder.transcode(audio).await?;
        // Start-up failures of either process surface here, before headers
        let body = stream::prime(transcoded).await.map_err(|e| match e {
            DownloadError::Streaming(msg) => DownloadError::Transcoder(msg),
            other => other,
        })?;

        tracing::info!(url, transcoder = self.transcoder.name(), "relaying audio");

        Ok(MediaDownload {
            content_type: self.transcoder.content_type().to_string(),
            filename: audio_filename(&self.site_name, &metadata.title),
            body,
        })
    }
}
