// Extraction diagnostics - classifies yt-dlp failures for operator logs
//
// Clients only ever see an opaque resolution failure; the classified reason
// is logged so operators can tell a private video from an IP block.

use serde::Serialize;

/// Reasons an upstream site may refuse extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlockingReason {
    DrmProtected,
    MembersOnly,
    SabrStreaming,
    PoTokenRequired,
    AgeRestricted,
    PrivateVideo,
    VideoUnavailable,
    GeoBlocked,
    RateLimited,
    BotDetection,
    Http403Forbidden,
    NetworkTimeout,
    UnsupportedUrl,
    Unknown,
}

/// Patterns checked in order; the first match wins
const PATTERNS: &[(BlockingReason, &[&str])] = &[
    (
        BlockingReason::DrmProtected,
        &["drm", "widevine", "playready", "fairplay", "requires purchase", "rental"],
    ),
    (
        BlockingReason::MembersOnly,
        &["members only", "members-only", "join this channel", "available to members"],
    ),
    (BlockingReason::SabrStreaming, &["sabr"]),
    (BlockingReason::PoTokenRequired, &["po token", "proof of origin"]),
    (
        BlockingReason::AgeRestricted,
        &["age-restricted", "sign in to confirm your age", "age_verification"],
    ),
    (
        BlockingReason::PrivateVideo,
        &["private video", "video is private", "sign in if you've been granted access"],
    ),
    (
        BlockingReason::VideoUnavailable,
        &["video unavailable", "video has been removed", "no longer available", "video is unavailable"],
    ),
    (
        BlockingReason::GeoBlocked,
        &["not available in your country", "blocked in your country", "geo restrict"],
    ),
    (BlockingReason::RateLimited, &["429", "rate limit", "too many requests"]),
    (
        BlockingReason::BotDetection,
        &["confirm you're not a bot", "captcha", "unusual traffic"],
    ),
    (BlockingReason::Http403Forbidden, &["403", "forbidden"]),
    (
        BlockingReason::NetworkTimeout,
        &["timeout", "timed out", "connection refused", "network unreachable"],
    ),
    (BlockingReason::UnsupportedUrl, &["unsupported url", "is not a valid url"]),
];

impl BlockingReason {
    /// Short description for log lines
    pub fn description(&self) -> &'static str {
        match self {
            Self::DrmProtected => "DRM-protected content",
            Self::MembersOnly => "members-only content",
            Self::SabrStreaming => "SABR streaming protection active",
            Self::PoTokenRequired => "proof of origin token required",
            Self::AgeRestricted => "age-restricted content",
            Self::PrivateVideo => "private video",
            Self::VideoUnavailable => "video unavailable",
            Self::GeoBlocked => "geographic restriction",
            Self::RateLimited => "rate limited by upstream",
            Self::BotDetection => "bot detection triggered",
            Self::Http403Forbidden => "access denied (HTTP 403)",
            Self::NetworkTimeout => "network timeout",
            Self::UnsupportedUrl => "unsupported URL",
            Self::Unknown => "unclassified failure",
        }
    }

    /// Whether retrying later (or through a proxy) might succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::SabrStreaming
                | Self::PoTokenRequired
                | Self::RateLimited
                | Self::BotDetection
                | Self::Http403Forbidden
                | Self::NetworkTimeout
        )
    }
}

/// Classify an error message; `None` for empty input
pub fn diagnose_error(error: &str) -> Option<BlockingReason> {
    if error.trim().is_empty() {
        return None;
    }

    let lower = error.to_lowercase();
    let reason = PATTERNS
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map(|(reason, _)| *reason)
        .unwrap_or(BlockingReason::Unknown);

    Some(reason)
}

/// First informative line of yt-dlp stderr (the `ERROR:` line if present)
pub fn summarize_stderr(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| stderr.lines().map(str::trim).rev().find(|l| !l.is_empty()))
        .unwrap_or("no output")
        .chars()
        .take(300)
        .collect()
}
