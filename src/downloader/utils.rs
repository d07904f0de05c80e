// Helper functions shared by the pipeline stages

use std::process::Stdio;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{HeaderName, HeaderValue};
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use super::errors::DownloadError;

/// Longest sanitized title, in bytes
const MAX_TITLE_BYTES: usize = 200;

/// Run command with timeout, collecting stdout and stderr
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, DownloadError> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let mut stdout_pipe = child.stdout.take().ok_or_else(|| {
        DownloadError::UpstreamResolution(format!("Failed to capture stdout from {}", program))
    })?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| {
        DownloadError::UpstreamResolution(format!("Failed to capture stderr from {}", program))
    })?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status_res) => {
            let status = status_res.map_err(|e| {
                DownloadError::UpstreamResolution(format!("Failed to wait for {}: {}", program, e))
            })?;
            let stdout = join_pipe(stdout_task, "stdout").await?;
            let stderr = join_pipe(stderr_task, "stderr").await?;
            Ok(std::process::Output { status, stdout, stderr })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(DownloadError::UpstreamResolution(format!(
                "{} timed out after {}s",
                program, timeout_secs
            )))
        }
    }
}

async fn join_pipe(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
    name: &str,
) -> Result<Vec<u8>, DownloadError> {
    task.await
        .map_err(|e| DownloadError::UpstreamResolution(format!("{} task failed: {}", name, e)))?
        .map_err(|e| DownloadError::UpstreamResolution(format!("Failed to read {}: {}", name, e)))
}

/// Map a spawn failure: a missing binary is a tool problem, anything else is upstream
pub fn spawn_error(program: &str, e: std::io::Error) -> DownloadError {
    if e.kind() == std::io::ErrorKind::NotFound {
        DownloadError::ToolNotFound(program.to_string())
    } else {
        DownloadError::UpstreamResolution(format!("Failed to start {}: {}", program, e))
    }
}

/// Validate the `url` query parameter: absolute http(s) URL with a host
pub fn validate_source_url(raw: Option<&str>) -> Result<reqwest::Url, DownloadError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DownloadError::Validation("url is required".to_string()))?;

    let url = reqwest::Url::parse(raw)
        .map_err(|e| DownloadError::Validation(format!("url is not a valid URL: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(DownloadError::Validation(format!(
            "url must be an http(s) URL: {}",
            raw
        )));
    }

    Ok(url)
}

/// Validate the `format` query parameter (opaque, non-empty)
pub fn validate_format_id(raw: Option<&str>) -> Result<String, DownloadError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DownloadError::Validation("format is required".to_string()))
}

/// Relative link to the combined video download for one encoding
pub fn video_download_link(source_url: &str, identifier: &str) -> String {
    format!(
        "/video/download-video?format={}&url={}",
        urlencoding::encode(identifier),
        urlencoding::encode(source_url)
    )
}

/// Relative link to the mp3 download; carries only the source URL
pub fn audio_download_link(source_url: &str) -> String {
    format!("/video/download-audio?url={}", urlencoding::encode(source_url))
}

/// Make a title safe for use as a file name.
///
/// Strips path separators, control characters, quotes and characters that
/// are reserved on common filesystems, collapses whitespace, refuses
/// reserved device names and bounds the length.
pub fn sanitize_filename(title: &str) -> String {
    lazy_static::lazy_static! {
        static ref ILLEGAL_RE: Regex = Regex::new(r#"[/\\?<>:*|"\x00-\x1f\x7f\x80-\x9f]"#).unwrap();
        static ref SPACE_RE: Regex = Regex::new(r"\s+").unwrap();
        static ref RESERVED_RE: Regex =
            Regex::new(r"(?i)^(con|prn|aux|nul|com[0-9]|lpt[0-9])(\..*)?$").unwrap();
        static ref DOTS_RE: Regex = Regex::new(r"^\.+$").unwrap();
    }

    let spaced = SPACE_RE.replace_all(title, " ");
    let cleaned = ILLEGAL_RE.replace_all(&spaced, "");
    let collapsed = SPACE_RE.replace_all(&cleaned, " ");
    let mut name = collapsed.trim().trim_end_matches('.').trim().to_string();

    if RESERVED_RE.is_match(&name) || DOTS_RE.is_match(&name) {
        name.clear();
    }

    if name.len() > MAX_TITLE_BYTES {
        let mut cut = MAX_TITLE_BYTES;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
        name = name.trim_end().to_string();
    }

    if name.is_empty() {
        "download".to_string()
    } else {
        name
    }
}

/// File name for the combined video download
pub fn video_filename(site_name: &str, title: &str, container: &str) -> String {
    let ext = sanitize_filename(container);
    format!("{}_{}.{}", sanitize_filename(site_name), sanitize_filename(title), ext)
}

/// File name for the mp3 download
pub fn audio_filename(site_name: &str, title: &str) -> String {
    format!("{} - {}.mp3", sanitize_filename(site_name), sanitize_filename(title))
}

/// `Content-Disposition` value for an attachment.
///
/// Non-ASCII characters are replaced in the plain `filename` parameter and
/// preserved in the RFC 5987 `filename*` parameter.
pub fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect();

    if ascii == filename {
        format!("attachment; filename=\"{}\"", ascii)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            ascii,
            urlencoding::encode(filename)
        )
    }
}

/// Build the outbound HTTP client used for probes and media relays
pub fn build_http_client(
    proxy: Option<&str>,
    user_agent: &str,
) -> Result<reqwest::Client, DownloadError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10));

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
            DownloadError::Validation(format!("Invalid proxy URL {}: {}", proxy_url, e))
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| DownloadError::Streaming(format!("Failed to build HTTP client: {}", e)))
}

/// Attach the headers yt-dlp reported for a media URL.
///
/// They replace client defaults such as the User-Agent. Pairs that are not
/// valid HTTP headers are skipped.
pub fn with_upstream_headers(
    mut request: reqwest::RequestBuilder,
    headers: &[(String, String)],
) -> reqwest::RequestBuilder {
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => request = request.header(name, value),
            _ => tracing::debug!(header = %name, "skipping invalid upstream header"),
        }
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_urls() {
        assert!(validate_source_url(Some("not-a-url")).is_err());
        assert!(validate_source_url(Some("")).is_err());
        assert!(validate_source_url(None).is_err());
        assert!(validate_source_url(Some("ftp://example.com/v")).is_err());
        assert!(validate_source_url(Some("https://www.youtube.com/watch?v=abc")).is_ok());
    }

    #[test]
    fn format_is_required() {
        assert!(validate_format_id(None).is_err());
        assert!(validate_format_id(Some("  ")).is_err());
        assert_eq!(validate_format_id(Some("18")).unwrap(), "18");
    }

    #[test]
    fn links_round_trip_through_query_decoding() {
        let source = "https://www.youtube.com/watch?v=abc&t=10";
        let link = video_download_link(source, "18");
        let url = reqwest::Url::parse(&format!("http://localhost{}", link)).unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["format"], "18");
        assert_eq!(pairs["url"], source);
        assert_eq!(url.path(), "/video/download-video");

        let audio = audio_download_link(source);
        assert!(audio.starts_with("/video/download-audio?url="));
        assert!(!audio.contains("format="));
    }

    #[test]
    fn sanitize_strips_separators_and_controls() {
        let name = sanitize_filename("a/b\\c\"d\ne\tf\u{7}g");
        assert!(!name.contains('/'));
        assert!(!name.contains('\\'));
        assert!(!name.contains('"'));
        assert!(!name.chars().any(|c| c.is_control()));
        assert_eq!(name, "abcd e fg");
    }

    #[test]
    fn sanitize_handles_degenerate_titles() {
        assert_eq!(sanitize_filename(""), "download");
        assert_eq!(sanitize_filename(".."), "download");
        assert_eq!(sanitize_filename("CON"), "download");
        assert_eq!(sanitize_filename("   //   "), "download");
        assert!(sanitize_filename(&"é".repeat(300)).len() <= MAX_TITLE_BYTES);
    }

    #[test]
    fn filenames_follow_site_patterns() {
        assert_eq!(
            video_filename("Ytdl.fun", "My / Video", "mp4"),
            "Ytdl.fun_My Video.mp4"
        );
        assert_eq!(audio_filename("Ytdl.fun", "Song: \"Live\""), "Ytdl.fun - Song Live.mp3");
    }

    #[test]
    fn disposition_is_header_safe() {
        assert_eq!(
            content_disposition("Ytdl.fun_clip.mp4"),
            "attachment; filename=\"Ytdl.fun_clip.mp4\""
        );

        let value = content_disposition("Ytdl.fun_café.mp4");
        assert!(value.is_ascii());
        assert!(value.contains("filename=\"Ytdl.fun_caf_.mp4\""));
        assert!(value.contains("filename*=UTF-8''Ytdl.fun_caf%C3%A9.mp4"));
    }
}
