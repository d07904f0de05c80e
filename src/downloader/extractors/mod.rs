// InfoExtractor module - video info extraction
//
// Two launch modes for the same yt-dlp extractor:
// - CLI mode: native `yt-dlp` binary (faster, no Python dependency)
// - Python mode: `python3 -m yt_dlp` (tracks upstream fixes via pip)

mod diagnostics;
mod traits;
mod ytdlp;

pub use diagnostics::{diagnose_error, summarize_stderr, BlockingReason};
pub use traits::{ExtractorConfig, ExtractorMode, InfoExtractor};
pub use ytdlp::{parse_metadata, YtDlpExtractor};
