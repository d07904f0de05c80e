//! HTTP server: router, shared context and lifecycle.

pub mod error;
pub mod routes;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::downloader::tools::resolve_program;
use crate::downloader::utils::build_http_client;
use crate::downloader::{DownloadError, Downloader, FfmpegTranscoder, FormatSelector, YtDlpExtractor};

pub use error::ApiError;

/// State shared by every handler
#[derive(Clone)]
pub struct AppContext {
    pub downloader: Arc<Downloader>,
    pub config: Arc<Config>,
}

impl AppContext {
    pub fn new(downloader: Downloader, config: Config) -> Self {
        Self {
            downloader: Arc::new(downloader),
            config: Arc::new(config),
        }
    }
}

/// Wire the yt-dlp extractor, ffmpeg transcoder and HTTP client from config
pub fn build_downloader(config: &Config) -> Result<Downloader, DownloadError> {
    let http = build_http_client(config.extractor.proxy.as_deref(), &config.probe.user_agent)?;
    let extractor = YtDlpExtractor::new(config.extractor.clone());
    let transcoder = FfmpegTranscoder::new(
        resolve_program(Some(&config.transcoder.ffmpeg_path), "ffmpeg"),
        config.transcoder.audio_bitrate_kbps,
    );

    Ok(Downloader::new(
        Arc::new(extractor),
        Arc::new(transcoder),
        FormatSelector::new(http.clone(), config.probe.timeout()),
        http,
        config.server.site_name.clone(),
    ))
}

/// Create the application router
pub fn create_router(ctx: AppContext) -> Router {
    let cors_any = ctx.config.server.cors_allow_any_origin;

    let router = Router::new()
        .route("/video/info", get(routes::video_info))
        .route("/video/download-video", get(routes::download_video))
        .route("/video/download-audio", get(routes::download_audio))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http());

    if cors_any {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET])
                .allow_headers(Any)
                .expose_headers([header::CONTENT_DISPOSITION]),
        )
    } else {
        router
    }
}

/// A bound server, ready to serve
pub struct App {
    listener: TcpListener,
    ctx: AppContext,
}

impl App {
    /// Bind `server.host:server.port` (port 0 picks a free port)
    pub async fn bind(ctx: AppContext) -> std::io::Result<Self> {
        let address = format!("{}:{}", ctx.config.server.host, ctx.config.server.port);
        let listener = TcpListener::bind(&address).await?;
        Ok(Self { listener, ctx })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` resolves, then let in-flight requests finish
    pub async fn serve<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address = self.local_addr()?;
        tracing::info!("Server listening on http://{}/", address);

        axum::serve(self.listener, create_router(self.ctx))
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }
}
