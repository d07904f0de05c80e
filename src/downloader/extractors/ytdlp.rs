// yt-dlp InfoExtractor
//
// Runs yt-dlp either as the native binary or as `python -m yt_dlp`. Metadata
// comes from `--dump-json`; the audio stream is yt-dlp writing the selected
// audio rendition to stdout.

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command as TokioCommand};

use super::diagnostics::{diagnose_error, summarize_stderr};
use super::traits::{ExtractorConfig, ExtractorMode, InfoExtractor};
use crate::downloader::errors::DownloadError;
use crate::downloader::models::{EncodingDescriptor, ThumbnailRef, VideoMetadata};
use crate::downloader::stream::{self, MediaStream};
use crate::downloader::tools::resolve_program;
use crate::downloader::utils::{run_output_with_timeout, spawn_error};

/// Audio-only rendition preferred, best overall audio otherwise
const AUDIO_SELECTOR: &str = "bestaudio[vcodec=none]/bestaudio";

/// How the yt-dlp process is started
#[derive(Debug, Clone, PartialEq, Eq)]
enum Launcher {
    Binary(String),
    Python(String),
}

impl Launcher {
    fn from_config(config: &ExtractorConfig) -> Self {
        match config.mode {
            ExtractorMode::Cli => {
                Launcher::Binary(resolve_program(config.ytdlp_path.as_deref(), "yt-dlp"))
            }
            ExtractorMode::Python => {
                let python = config
                    .python_path
                    .clone()
                    .or_else(|| std::env::var("YTDLP_PYTHON").ok())
                    .unwrap_or_else(|| resolve_program(None, "python3"));
                Launcher::Python(python)
            }
        }
    }

    fn program(&self) -> &str {
        match self {
            Launcher::Binary(path) | Launcher::Python(path) => path,
        }
    }

    fn base_args(&self) -> Vec<String> {
        match self {
            Launcher::Binary(_) => Vec::new(),
            Launcher::Python(_) => vec!["-m".to_string(), "yt_dlp".to_string()],
        }
    }
}

pub struct YtDlpExtractor {
    config: ExtractorConfig,
    launcher: Launcher,
}

impl YtDlpExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let launcher = Launcher::from_config(&config);
        tracing::debug!(mode = %config.mode, program = launcher.program(), "yt-dlp launcher ready");
        Self { config, launcher }
    }

    /// Program used to launch yt-dlp (binary or python interpreter)
    pub fn program(&self) -> &str {
        self.launcher.program()
    }

    /// Arguments that precede every yt-dlp option (`-m yt_dlp` in Python mode)
    pub fn launch_args(&self) -> Vec<String> {
        self.launcher.base_args()
    }

    fn info_args(&self, url: &str) -> Vec<String> {
        let mut args = self.launcher.base_args();
        args.push("--dump-json".to_string());
        args.extend(self.config.common_args(url));
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    fn audio_args(&self, url: &str) -> Vec<String> {
        let mut args = self.launcher.base_args();
        args.extend(self.config.common_args(url));
        args.extend([
            "--quiet".to_string(),
            "-f".to_string(),
            AUDIO_SELECTOR.to_string(),
            "-o".to_string(),
            "-".to_string(),
            "--".to_string(),
            url.to_string(),
        ]);
        args
    }

    /// Turn a failed invocation into an opaque resolution error, logging the
    /// classified reason for operators.
    fn failure(&self, url: &str, stderr: &str) -> DownloadError {
        if matches!(self.launcher, Launcher::Python(_)) && stderr.contains("No module named yt_dlp") {
            return DownloadError::ToolNotFound("yt_dlp python module".to_string());
        }

        let summary = summarize_stderr(stderr);
        let reason = diagnose_error(stderr);
        tracing::warn!(
            url,
            reason = reason.map(|r| r.description()).unwrap_or("none"),
            transient = reason.map(|r| r.is_transient()).unwrap_or(false),
            "yt-dlp failed: {}",
            summary
        );
        DownloadError::UpstreamResolution(summary)
    }
}

#[async_trait]
impl InfoExtractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn resolve(&self, url: &str) -> Result<VideoMetadata, DownloadError> {
        let args = self.info_args(url);
        tracing::debug!(program = self.launcher.program(), args = %args.join(" "), "resolving");

        let output = run_output_with_timeout(
            self.launcher.program(),
            args,
            self.config.timeout_seconds as u64,
        )
        .await
        .inspect_err(|e| {
            if let DownloadError::UpstreamResolution(msg) = e {
                if let Some(reason) = diagnose_error(msg) {
                    tracing::warn!(url, reason = reason.description(), "yt-dlp did not finish");
                }
            }
        })?;

        if !output.status.success() {
            return Err(self.failure(url, &String::from_utf8_lossy(&output.stderr)));
        }

        let metadata = parse_metadata(&output.stdout)?;
        tracing::debug!(
            url,
            title = %metadata.title,
            encodings = metadata.encodings.len(),
            "resolved"
        );
        Ok(metadata)
    }

    async fn open_audio_stream(&self, url: &str) -> Result<MediaStream, DownloadError> {
        let args = self.audio_args(url);
        tracing::debug!(program = self.launcher.program(), args = %args.join(" "), "opening audio stream");

        let mut child = TokioCommand::new(self.launcher.program())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(self.launcher.program(), e))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr, url.to_string()));
        }

        stream::from_child(child, None, "yt-dlp")
    }
}

/// Log yt-dlp stderr line by line until the process exits
async fn drain_stderr(stderr: ChildStderr, url: String) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.starts_with("ERROR:") {
            let reason = diagnose_error(&line).map(|r| r.description()).unwrap_or("none");
            tracing::warn!(url = %url, reason, "yt-dlp: {}", line);
        } else {
            tracing::debug!(url = %url, "yt-dlp: {}", line);
        }
    }
}

/// Parse `--dump-json` output
pub fn parse_metadata(stdout: &[u8]) -> Result<VideoMetadata, DownloadError> {
    let json: Value = serde_json::from_slice(stdout)
        .map_err(|e| DownloadError::UpstreamResolution(format!("Invalid JSON from yt-dlp: {}", e)))?;

    let encodings = json["formats"]
        .as_array()
        .ok_or_else(|| DownloadError::UpstreamResolution("No formats array in JSON".to_string()))?
        .iter()
        .filter_map(parse_encoding)
        .collect();

    Ok(VideoMetadata {
        title: json["title"].as_str().unwrap_or("Unknown").to_string(),
        description: json["description"].as_str().unwrap_or("").to_string(),
        thumbnails: parse_thumbnails(&json),
        encodings,
    })
}

fn parse_thumbnails(json: &Value) -> Vec<ThumbnailRef> {
    // yt-dlp lists thumbnails from worst to best
    let thumbnails: Vec<ThumbnailRef> = json["thumbnails"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|t| {
                    Some(ThumbnailRef {
                        url: t["url"].as_str()?.to_string(),
                        width: t["width"].as_u64().map(|w| w as u32),
                        height: t["height"].as_u64().map(|h| h as u32),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    if !thumbnails.is_empty() {
        return thumbnails;
    }

    json["thumbnail"]
        .as_str()
        .map(|url| {
            vec![ThumbnailRef {
                url: url.to_string(),
                width: None,
                height: None,
            }]
        })
        .unwrap_or_default()
}

fn parse_encoding(f: &Value) -> Option<EncodingDescriptor> {
    let identifier = f["format_id"].as_str().filter(|s| !s.is_empty())?;
    let media_url = f["url"].as_str().filter(|s| !s.is_empty())?;

    // Manifest-based protocols (HLS, DASH segments) cannot be relayed with one GET
    if let Some(protocol) = f["protocol"].as_str() {
        if !protocol.starts_with("http") || protocol.contains("dash") {
            return None;
        }
    }

    let vcodec = codec(&f["vcodec"]);
    let acodec = codec(&f["acodec"]);
    let has_video = vcodec.is_some();
    let has_audio = acodec.is_some();
    let container = f["ext"].as_str().unwrap_or("mp4").to_string();
    let fps = f["fps"].as_f64().filter(|fps| *fps > 0.0);

    let quality_label = if has_video {
        f["height"].as_u64().map(|h| quality_label(h, fps))
    } else {
        None
    };

    let codecs: Vec<&str> = [vcodec, acodec].into_iter().flatten().collect();
    let kind = if has_video { "video" } else { "audio" };
    let mime_type = if codecs.is_empty() {
        format!("{}/{}", kind, container)
    } else {
        format!("{}/{}; codecs=\"{}\"", kind, container, codecs.join(", "))
    };

    Some(EncodingDescriptor {
        identifier: identifier.to_string(),
        quality_label,
        mime_type,
        fps,
        container,
        media_url: media_url.to_string(),
        http_headers: parse_http_headers(&f["http_headers"]),
        has_audio,
        has_video,
    })
}

/// `http_headers` object of a format; non-string values are skipped
fn parse_http_headers(value: &Value) -> Vec<(String, String)> {
    value
        .as_object()
        .map(|headers| {
            headers
                .iter()
                .filter_map(|(name, v)| Some((name.clone(), v.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// A codec field, `None` when absent or "none"
fn codec(value: &Value) -> Option<&str> {
    value.as_str().filter(|c| !c.is_empty() && *c != "none")
}

/// "720p", or "720p60" above 30 fps
fn quality_label(height: u64, fps: Option<f64>) -> String {
    match fps {
        Some(fps) if fps > 30.0 => format!("{}p{}", height, fps.round() as u64),
        _ => format!("{}p", height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dump(formats: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "abc",
            "title": "Clip title",
            "description": "A clip",
            "thumbnails": [
                {"url": "https://i.example.com/small.jpg", "width": 120, "height": 90},
                {"url": "https://i.example.com/large.jpg", "width": 1280, "height": 720}
            ],
            "formats": formats
        }))
        .unwrap()
    }

    #[test]
    fn parses_combined_and_adaptive_formats() {
        let stdout = dump(json!([
            {
                "format_id": "18", "url": "https://cdn.example.com/18", "protocol": "https",
                "ext": "mp4", "height": 360, "fps": 30.0,
                "vcodec": "avc1.42001E", "acodec": "mp4a.40.2"
            },
            {
                "format_id": "299", "url": "https://cdn.example.com/299", "protocol": "https",
                "ext": "mp4", "height": 1080, "fps": 60.0,
                "vcodec": "avc1.64002a", "acodec": "none"
            },
            {
                "format_id": "140", "url": "https://cdn.example.com/140", "protocol": "https",
                "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2"
            }
        ]));

        let meta = parse_metadata(&stdout).unwrap();
        assert_eq!(meta.title, "Clip title");
        assert_eq!(meta.best_thumbnail(), Some("https://i.example.com/large.jpg"));
        assert_eq!(meta.encodings.len(), 3);

        let combined = meta.find_encoding("18").unwrap();
        assert!(combined.is_combined());
        assert_eq!(combined.quality_label.as_deref(), Some("360p"));
        assert_eq!(combined.mime_type, "video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"");

        let video_only = meta.find_encoding("299").unwrap();
        assert!(!video_only.has_audio);
        assert_eq!(video_only.quality_label.as_deref(), Some("1080p60"));

        let audio_only = meta.find_encoding("140").unwrap();
        assert!(audio_only.has_audio && !audio_only.has_video);
        assert_eq!(audio_only.quality_label, None);
        assert_eq!(audio_only.mime_type, "audio/m4a; codecs=\"mp4a.40.2\"");
    }

    #[test]
    fn keeps_per_format_request_headers() {
        let stdout = dump(json!([
            {
                "format_id": "22", "url": "https://cdn.example.com/22", "protocol": "https",
                "ext": "mp4", "height": 720, "vcodec": "avc1", "acodec": "mp4a",
                "http_headers": {"Referer": "https://site.example/", "Sec-Fetch-Mode": "navigate", "X-Count": 3}
            },
            {
                "format_id": "18", "url": "https://cdn.example.com/18", "protocol": "https",
                "ext": "mp4", "height": 360, "vcodec": "avc1", "acodec": "mp4a"
            }
        ]));

        let meta = parse_metadata(&stdout).unwrap();
        let headers = &meta.find_encoding("22").unwrap().http_headers;
        assert_eq!(headers.len(), 2);
        assert!(headers.contains(&("Referer".to_string(), "https://site.example/".to_string())));
        assert!(meta.find_encoding("18").unwrap().http_headers.is_empty());
    }

    #[test]
    fn skips_unrelayable_formats() {
        let stdout = dump(json!([
            {"format_id": "hls-720", "url": "https://cdn.example.com/x.m3u8", "protocol": "m3u8_native",
             "ext": "mp4", "height": 720, "vcodec": "avc1", "acodec": "mp4a"},
            {"format_id": "", "url": "https://cdn.example.com/y"},
            {"format_id": "sb0", "protocol": "mhtml"},
            {"format_id": "22", "url": "https://cdn.example.com/22", "ext": "mp4",
             "height": 720, "vcodec": "avc1", "acodec": "mp4a"}
        ]));

        let meta = parse_metadata(&stdout).unwrap();
        let ids: Vec<&str> = meta.encodings.iter().map(|e| e.identifier.as_str()).collect();
        assert_eq!(ids, vec!["22"]);
    }

    #[test]
    fn falls_back_to_single_thumbnail() {
        let stdout = serde_json::to_vec(&json!({
            "title": "t",
            "thumbnail": "https://i.example.com/only.jpg",
            "formats": []
        }))
        .unwrap();

        let meta = parse_metadata(&stdout).unwrap();
        assert_eq!(meta.best_thumbnail(), Some("https://i.example.com/only.jpg"));
        assert_eq!(meta.description, "");
    }

    #[test]
    fn invalid_output_is_a_resolution_error() {
        let err = parse_metadata(b"not json").unwrap_err();
        assert!(matches!(err, DownloadError::UpstreamResolution(_)));

        let err = parse_metadata(b"{\"title\": \"x\"}").unwrap_err();
        assert!(matches!(err, DownloadError::UpstreamResolution(_)));
    }

    #[test]
    fn python_launcher_runs_module() {
        let config = ExtractorConfig {
            mode: ExtractorMode::Python,
            python_path: Some("/usr/bin/python3".to_string()),
            ..Default::default()
        };
        let extractor = YtDlpExtractor::new(config);
        assert_eq!(extractor.program(), "/usr/bin/python3");
        assert_eq!(extractor.launch_args(), ["-m", "yt_dlp"]);

        let args = extractor.info_args("https://example.com/v");
        assert_eq!(&args[..3], ["-m", "yt_dlp", "--dump-json"]);
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/v"));
    }

    #[test]
    fn audio_args_write_to_stdout() {
        let extractor = YtDlpExtractor::new(
            ExtractorConfig::default().with_ytdlp_path(Some("/usr/local/bin/yt-dlp".to_string())),
        );
        let args = extractor.audio_args("https://example.com/v");
        assert!(args.windows(2).any(|w| w == ["-o", "-"]));
        assert!(args.windows(2).any(|w| w == ["-f", AUDIO_SELECTOR]));
        assert!(!args.contains(&"--dump-json".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_binary_is_tool_error() {
        let extractor = YtDlpExtractor::new(
            ExtractorConfig::default().with_ytdlp_path(Some("/nonexistent/yt-dlp".to_string())),
        );
        let err = extractor.resolve("https://example.com/v").await.unwrap_err();
        assert!(matches!(err, DownloadError::ToolNotFound(_)));
    }
}
