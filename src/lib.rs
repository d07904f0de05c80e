//! Resolve public video URLs into downloadable media streams over HTTP.
//!
//! `downloader` holds the resolution, enrichment and streaming pipeline;
//! `server` exposes it under `/video`.

pub mod config;
pub mod downloader;
pub mod logging;
pub mod server;

pub use config::Config;
pub use server::{build_downloader, create_router, App, AppContext};
