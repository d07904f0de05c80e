use std::path::PathBuf;

use clap::Parser;

use ytdl_relay::config::Config;
use ytdl_relay::downloader::tools::{resolve_program, ToolManager};
use ytdl_relay::downloader::YtDlpExtractor;
use ytdl_relay::{build_downloader, logging, App, AppContext};

#[derive(Debug, Parser)]
#[command(name = "ytdl-relay", version, about = "Resolve video URLs into downloadable media")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "YTDL_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind (overrides config and HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,

    /// Print detected yt-dlp and ffmpeg, then exit
    #[arg(long)]
    check_tools: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    config.apply_env()?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    logging::init(&config.logging.level);

    for warning in config.validate() {
        tracing::warn!("config: {}", warning);
    }

    // Python mode reports the interpreter running `-m yt_dlp`
    let ytdlp = YtDlpExtractor::new(config.extractor.clone());
    let tools = ToolManager::new(
        ytdlp.program(),
        resolve_program(Some(&config.transcoder.ffmpeg_path), "ffmpeg"),
    )
    .with_ytdlp_args(ytdlp.launch_args())
    .get_all_tools()
    .await;

    if cli.check_tools {
        for tool in &tools {
            println!(
                "{:<8} {:<10} {} {}",
                tool.name,
                if tool.is_available { "found" } else { "missing" },
                tool.path.as_deref().unwrap_or("-"),
                tool.version.as_deref().unwrap_or("")
            );
        }
        return Ok(());
    }

    for tool in &tools {
        match (&tool.path, &tool.version) {
            (Some(path), Some(version)) => {
                tracing::info!(tool = %tool.name, path = %path, version = %version, "tool detected")
            }
            _ => tracing::warn!(tool = %tool.name, "tool not found; related endpoints will fail"),
        }
    }

    let downloader = build_downloader(&config)?;
    let app = App::bind(AppContext::new(downloader, config)).await?;

    app.serve(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
    })
    .await?;

    Ok(())
}
