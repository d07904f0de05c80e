// Audio transcoding (mp3) as a streaming stage
//
// Input is consumed incrementally and output produced incrementally; the
// transcoder never needs the whole input before emitting bytes.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio_util::io::StreamReader;

use super::errors::DownloadError;
use super::stream::{self, Feeder, MediaStream};

pub const MP3_CONTENT_TYPE: &str = "audio/mpeg";
pub const DEFAULT_BITRATE_KBPS: u32 = 128;

#[async_trait]
pub trait Transcoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Content type of the produced stream
    fn content_type(&self) -> &'static str {
        MP3_CONTENT_TYPE
    }

    /// Start transcoding `input`; fails only if the transcoder cannot start
    async fn transcode(&self, input: MediaStream) -> Result<MediaStream, DownloadError>;
}

/// ffmpeg reading from stdin and writing mp3 to stdout
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    bitrate_kbps: u32,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>, bitrate_kbps: u32) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            bitrate_kbps,
        }
    }

    fn build_args(&self) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            "pipe:0".to_string(),
            "-vn".to_string(),
            "-f".to_string(),
            "mp3".to_string(),
            "-b:a".to_string(),
            format!("{}k", self.bitrate_kbps),
            "pipe:1".to_string(),
        ]
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn transcode(&self, input: MediaStream) -> Result<MediaStream, DownloadError> {
        let mut command = TokioCommand::new(&self.ffmpeg_path);
        command.args(self.build_args());

        let output = pipe_through(command, input, "ffmpeg")?;
        tracing::debug!(bitrate_kbps = self.bitrate_kbps, "ffmpeg transcoder started");
        Ok(output)
    }
}

/// Spawn `command`, feed `input` into its stdin and stream its stdout.
///
/// Stderr lines mentioning an error are logged at warn, the rest at debug.
/// Dropping the returned stream kills the process
/// and stops the feeder.
pub fn pipe_through(
    mut command: TokioCommand,
    input: MediaStream,
    label: &'static str,
) -> Result<MediaStream, DownloadError> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| DownloadError::Transcoder(format!("Failed to start {}: {}", label, e)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| DownloadError::Transcoder(format!("Failed to capture {} stdin", label)))?;

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.to_ascii_lowercase().contains("error") {
                    tracing::warn!(process = label, "{}", line);
                } else {
                    tracing::debug!(process = label, "{}", line);
                }
            }
        });
    }

    let feeder = Feeder::new(tokio::spawn(async move {
        let mut reader = StreamReader::new(input);
        let copied = tokio::io::copy(&mut reader, &mut stdin).await?;
        // Closing stdin lets the process flush and exit
        stdin.shutdown().await?;
        Ok(copied)
    }));

    stream::from_child(child, Some(feeder), label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::{StreamExt, TryStreamExt};

    #[test]
    fn args_request_mp3_at_bitrate() {
        let args = FfmpegTranscoder::new("ffmpeg", DEFAULT_BITRATE_KBPS).build_args();
        assert!(args.windows(2).any(|w| w == ["-b:a", "128k"]));
        assert!(args.windows(2).any(|w| w == ["-f", "mp3"]));
        assert_eq!(args.last().map(String::as_str), Some("pipe:1"));
    }

    #[tokio::test]
    async fn missing_ffmpeg_is_transcoder_error() {
        let transcoder = FfmpegTranscoder::new("/nonexistent/ffmpeg", 128);
        let input = futures::stream::empty().boxed();
        let err = transcoder.transcode(input).await.err().unwrap();
        assert!(matches!(err, DownloadError::Transcoder(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn pipes_input_through_process() {
        let input = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"def")),
        ])
        .boxed();

        let output: Vec<Bytes> = pipe_through(TokioCommand::new("cat"), input, "cat")
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(output.concat(), b"abcdef");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_input_aborts_output() {
        let input = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"abc")),
            Err(std::io::Error::other("upstream reset")),
        ])
        .boxed();

        let mut output = pipe_through(TokioCommand::new("cat"), input, "cat").unwrap();
        let mut saw_error = false;
        while let Some(item) = output.next().await {
            saw_error |= item.is_err();
        }
        assert!(saw_error);
    }

    /// Running and not yet a zombie waiting to be reaped
    #[cfg(target_os = "linux")]
    fn process_alive(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            // State follows the parenthesised command name
            Ok(stat) => stat
                .rsplit_once(')')
                .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn dropping_output_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("pid");
        let mut command = TokioCommand::new("sh");
        command.args([
            "-c",
            &format!("echo $$ > {}; printf x; exec sleep 30", pidfile.display()),
        ]);

        let input: MediaStream = futures::stream::pending().boxed();
        let mut output = pipe_through(command, input, "sh").unwrap();
        let first = output.next().await.unwrap().unwrap();
        assert_eq!(first.as_ref(), b"x");

        let pid = std::fs::read_to_string(&pidfile).unwrap().trim().to_string();
        assert!(process_alive(&pid));

        drop(output);
        let mut alive = true;
        for _ in 0..40 {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            alive = process_alive(&pid);
            if !alive {
                break;
            }
        }
        assert!(!alive, "sleep {} survived the dropped stream", pid);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dropping_output_releases_input() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        // The sender lives inside the input stream; it closes once the feeder drops it
        let input = futures::stream::pending::<Result<Bytes, std::io::Error>>()
            .map(move |item| {
                let _held = &tx;
                item
            })
            .boxed();

        let output = pipe_through(TokioCommand::new("cat"), input, "cat").unwrap();
        drop(output);

        let closed = tokio::time::timeout(std::time::Duration::from_secs(2), rx).await;
        assert!(matches!(closed, Ok(Err(_))), "input stream outlived the output");
    }
}
