// External tool detection (yt-dlp, ffmpeg)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::utils::run_output_with_timeout;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

/// Locate a binary: common install locations first, then every `PATH` entry
pub fn find_binary(name: &str) -> Option<PathBuf> {
    let common_paths = [
        format!("/opt/homebrew/bin/{}", name), // Homebrew on Apple Silicon
        format!("/usr/local/bin/{}", name),    // Homebrew on Intel Mac
        format!("/usr/bin/{}", name),
    ];

    for path in common_paths {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Some(path);
        }
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Resolve a configured program: explicit paths are used as given, bare
/// names are looked up and fall back to the name itself.
pub fn resolve_program(configured: Option<&str>, default_name: &str) -> String {
    match configured {
        Some(p) if p.contains('/') || Path::new(p).is_absolute() => p.to_string(),
        Some(name) => find_binary(name)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string()),
        None => find_binary(default_name)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| default_name.to_string()),
    }
}

pub struct ToolManager {
    ytdlp_path: String,
    ytdlp_args: Vec<String>,
    ffmpeg_path: String,
}

impl ToolManager {
    pub fn new(ytdlp_path: impl Into<String>, ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            ytdlp_args: Vec::new(),
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Arguments placed before `--version` when yt-dlp runs through an
    /// interpreter, e.g. `-m yt_dlp`
    pub fn with_ytdlp_args(mut self, args: Vec<String>) -> Self {
        self.ytdlp_args = args;
        self
    }

    pub async fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let (configured, prefix) = match tool_type {
            ToolType::YtDlp => (&self.ytdlp_path, self.ytdlp_args.as_slice()),
            ToolType::Ffmpeg => (&self.ffmpeg_path, &[][..]),
        };

        let version = get_version(configured, prefix, tool_type).await;

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            is_available: version.is_some(),
            path: version.as_ref().map(|_| configured.clone()),
            version,
        }
    }

    pub async fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp).await,
            self.get_tool_info(ToolType::Ffmpeg).await,
        ]
    }
}

async fn get_version(path: &str, prefix: &[String], tool_type: ToolType) -> Option<String> {
    let mut args = prefix.to_vec();
    args.push(tool_type.version_arg().to_string());
    let output = run_output_with_timeout(path, args, 10).await.ok()?;

    if !output.status.success() {
        return None;
    }

    // ffmpeg prints a banner; the first line carries the version
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
}
