// Downloader module - resolution, enrichment and streaming pipeline

pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod stream;
pub mod tools;
pub mod transcoder;
pub mod utils;

pub use errors::{DownloadError, ErrorKind};
pub use extractors::{ExtractorConfig, ExtractorMode, InfoExtractor, YtDlpExtractor};
pub use format_selector::FormatSelector;
pub use models::{EncodingDescriptor, EnrichedFormat, MediaDownload, VideoInfoResponse, VideoMetadata};
pub use orchestrator::Downloader;
pub use stream::MediaStream;
pub use transcoder::{FfmpegTranscoder, Transcoder};
