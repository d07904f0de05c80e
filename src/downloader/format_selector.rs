// FormatSelector - turns resolved encodings into client-facing formats
//
// - Keeps audio-bearing encodings only
// - Probes every survivor's size concurrently (HEAD, bounded per probe)
// - Builds the video/audio download links
// - Drops encodings without a quality label
//
// Result order always follows the resolved encoding order.

use std::time::Duration;

use futures::future::join_all;
use reqwest::header::CONTENT_LENGTH;

use super::errors::DownloadError;
use super::models::{EncodingDescriptor, EnrichedFormat};
use super::utils::{audio_download_link, video_download_link, with_upstream_headers};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Format enricher with best-effort size probing
#[derive(Clone)]
pub struct FormatSelector {
    client: reqwest::Client,
    probe_timeout: Duration,
}

impl FormatSelector {
    pub fn new(client: reqwest::Client, probe_timeout: Duration) -> Self {
        Self {
            client,
            probe_timeout,
        }
    }

    /// Enrich `encodings` of `source_url` for the info response.
    ///
    /// Never fails: a probe that errors or times out only leaves `size` empty.
    pub async fn enrich(
        &self,
        encodings: &[EncodingDescriptor],
        source_url: &str,
    ) -> Vec<EnrichedFormat> {
        let audio_bearing: Vec<&EncodingDescriptor> =
            encodings.iter().filter(|e| e.has_audio).collect();

        // join_all yields results in input order, whatever order probes finish in
        let sizes = join_all(audio_bearing.iter().map(|e| self.probe_or_none(e))).await;

        audio_bearing
            .into_iter()
            .zip(sizes)
            .filter_map(|(encoding, size)| {
                let quality = encoding.quality_label.clone()?;
                Some(EnrichedFormat {
                    quality,
                    mime_type: encoding.mime_type.clone(),
                    fps: encoding.fps,
                    size,
                    file_extension: encoding.container.clone(),
                    video_download_url: video_download_link(source_url, &encoding.identifier),
                    audio_download_url: audio_download_link(source_url),
                })
            })
            .collect()
    }

    async fn probe_or_none(&self, encoding: &EncodingDescriptor) -> Option<u64> {
        match self.probe_size(encoding).await {
            Ok(size) => Some(size),
            Err(e) => {
                tracing::debug!(format = %encoding.identifier, "size probe skipped: {}", e);
                None
            }
        }
    }

    /// HEAD the encoding's media URL and read its `Content-Length`
    pub async fn probe_size(&self, encoding: &EncodingDescriptor) -> Result<u64, DownloadError> {
        let request =
            with_upstream_headers(self.client.head(&encoding.media_url), &encoding.http_headers).send();
        let response = tokio::time::timeout(self.probe_timeout, request)
            .await
            .map_err(|_| {
                DownloadError::Probe(format!("timed out after {:?}", self.probe_timeout))
            })?
            .map_err(|e| DownloadError::Probe(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DownloadError::Probe(format!(
                "upstream answered {}",
                response.status()
            )));
        }

        // Read the header itself: a HEAD response has no body to size
        response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or_else(|| DownloadError::Probe("no content length".to_string()))
    }
}
