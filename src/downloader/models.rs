// Common data models for the resolution and streaming pipeline

use serde::{Deserialize, Serialize};

use super::stream::MediaStream;

/// Thumbnail reference as reported by the extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailRef {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// One encoding (format) offered by the upstream source.
///
/// `media_url` and `http_headers` describe the direct upstream request and
/// never leave the server.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingDescriptor {
    /// Opaque token used to re-select this encoding (yt-dlp `format_id`)
    pub identifier: String,
    /// Human-readable quality such as "720p" or "1080p60"
    pub quality_label: Option<String>,
    /// e.g. `video/mp4; codecs="avc1.42001E, mp4a.40.2"`
    pub mime_type: String,
    pub fps: Option<f64>,
    /// Container / file extension (mp4, webm, m4a)
    pub container: String,
    pub media_url: String,
    /// Headers the upstream expects on requests for `media_url`
    pub http_headers: Vec<(String, String)>,
    pub has_audio: bool,
    pub has_video: bool,
}

impl EncodingDescriptor {
    /// Whether this encoding carries both audio and video
    pub fn is_combined(&self) -> bool {
        self.has_audio && self.has_video
    }
}

/// Metadata for a single resolution of a source URL
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    /// Ordered from smallest to largest
    pub thumbnails: Vec<ThumbnailRef>,
    pub encodings: Vec<EncodingDescriptor>,
}

impl VideoMetadata {
    /// The last (highest resolution) thumbnail
    pub fn best_thumbnail(&self) -> Option<&str> {
        self.thumbnails.last().map(|t| t.url.as_str())
    }

    pub fn find_encoding(&self, identifier: &str) -> Option<&EncodingDescriptor> {
        self.encodings.iter().find(|e| e.identifier == identifier)
    }
}

/// Client-facing view of an audio-bearing encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedFormat {
    pub quality: String,
    pub mime_type: String,
    pub fps: Option<f64>,
    /// Content length reported by the size probe; omitted when the probe failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub file_extension: String,
    pub video_download_url: String,
    pub audio_download_url: String,
}

/// Response body of `GET /video/info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfoResponse {
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub formats: Vec<EnrichedFormat>,
}

/// A ready-to-send media response: headers plus a lazily pulled body
pub struct MediaDownload {
    pub content_type: String,
    pub filename: String,
    pub body: MediaStream,
}

impl std::fmt::Debug for MediaDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaDownload")
            .field("content_type", &self.content_type)
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}
