// InfoExtractor trait and extractor configuration

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::downloader::errors::DownloadError;
use crate::downloader::models::VideoMetadata;
use crate::downloader::stream::MediaStream;

/// How yt-dlp is launched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorMode {
    /// Native `yt-dlp` binary
    #[default]
    Cli,
    /// `python3 -m yt_dlp`
    Python,
}

impl fmt::Display for ExtractorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::Python => write!(f, "python"),
        }
    }
}

/// Configuration for info extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub mode: ExtractorMode,
    /// yt-dlp binary; detected on PATH and common install locations when unset
    pub ytdlp_path: Option<String>,
    /// Python interpreter for `Python` mode; `YTDLP_PYTHON` is honored when unset
    pub python_path: Option<String>,
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// Path to cookies.txt file
    pub cookies_path: Option<String>,
    /// Use cookies from browser (Chrome)
    pub cookies_from_browser: bool,
    /// Per-invocation timeout in seconds
    pub timeout_seconds: u32,
    /// YouTube player client (android, web, tv)
    pub player_client: Option<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            mode: ExtractorMode::Cli,
            ytdlp_path: None,
            python_path: None,
            proxy: None,
            cookies_path: None,
            cookies_from_browser: false,
            timeout_seconds: 30,
            player_client: None,
        }
    }
}

impl ExtractorConfig {
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_ytdlp_path(mut self, path: Option<String>) -> Self {
        self.ytdlp_path = path;
        self
    }

    pub fn with_timeout(mut self, seconds: u32) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Arguments shared by every yt-dlp invocation (network, auth, client)
    pub fn common_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.timeout_seconds.to_string(),
            "--retries".to_string(),
            "2".to_string(),
        ];

        let lower = url.to_lowercase();
        if lower.contains("youtube.com") || lower.contains("youtu.be") {
            if let Some(client) = &self.player_client {
                args.push("--extractor-args".to_string());
                args.push(format!("youtube:player_client={}", client));
            }
        }

        if let Some(path) = &self.cookies_path {
            args.push("--cookies".to_string());
            args.push(path.clone());
        } else if self.cookies_from_browser {
            args.push("--cookies-from-browser".to_string());
            args.push("chrome".to_string());
        }

        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args
    }
}

/// Upstream video-info and extraction capability.
///
/// Implementations must not cache: every call re-resolves the source.
#[async_trait]
pub trait InfoExtractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Fetch title, description, thumbnails and every available encoding.
    ///
    /// Any failure (unreachable, private, unparseable) is reported as
    /// [`DownloadError::UpstreamResolution`] or, when the tool itself is
    /// missing, [`DownloadError::ToolNotFound`].
    async fn resolve(&self, url: &str) -> Result<VideoMetadata, DownloadError>;

    /// Open a stream of the best audio-only rendition, chosen by the extractor
    async fn open_audio_stream(&self, url: &str) -> Result<MediaStream, DownloadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_args_carry_network_options() {
        let config = ExtractorConfig::default()
            .with_proxy(Some("socks5://127.0.0.1:1080".to_string()))
            .with_timeout(12);
        let args = config.common_args("https://example.com/v/1");

        assert!(args.windows(2).any(|w| w == ["--proxy", "socks5://127.0.0.1:1080"]));
        assert!(args.windows(2).any(|w| w == ["--socket-timeout", "12"]));
        assert!(!args.iter().any(|a| a == "--extractor-args"));
    }

    #[test]
    fn player_client_only_for_youtube() {
        let config = ExtractorConfig {
            player_client: Some("android".to_string()),
            ..Default::default()
        };

        let yt = config.common_args("https://youtu.be/abc");
        assert!(yt.contains(&"youtube:player_client=android".to_string()));

        let other = config.common_args("https://vimeo.com/1");
        assert!(!other.contains(&"youtube:player_client=android".to_string()));
    }

    #[test]
    fn mode_deserializes_lowercase() {
        let config: ExtractorConfig = toml::from_str("mode = \"python\"").unwrap();
        assert_eq!(config.mode, ExtractorMode::Python);
        assert_eq!(config.timeout_seconds, 30);
    }
}
