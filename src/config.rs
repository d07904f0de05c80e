// Configuration: defaults, TOML file, environment, then CLI overrides

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::downloader::extractors::ExtractorConfig;
use crate::downloader::transcoder::DEFAULT_BITRATE_KBPS;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "YTDL_RELAY_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub extractor: ExtractorConfig,
    pub probe: ProbeConfig,
    pub transcoder: TranscoderConfig,
    pub logging: LoggingConfig,
}

/// Status returned for malformed query parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// 400
    #[default]
    BadRequest,
    /// 500, as older clients expect
    InternalError,
}

impl ValidationStatus {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::InternalError => 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Prefix of every download file name
    pub site_name: String,
    pub cors_allow_any_origin: bool,
    pub validation_status: ValidationStatus,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            site_name: "Ytdl.fun".to_string(),
            cors_allow_any_origin: true,
            validation_status: ValidationStatus::BadRequest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36".to_string(),
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    pub ffmpeg_path: String,
    pub audio_bitrate_kbps: u32,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            audio_bitrate_kbps: DEFAULT_BITRATE_KBPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.check()?;
        Ok(config)
    }

    /// Load from `custom_path`, `$YTDL_RELAY_CONFIG` or the user config
    /// directory, in that order; defaults when none exists.
    pub fn load_or_default(custom_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = custom_path {
            return Self::load(path);
        }

        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        if let Some(path) = default_path().filter(|p| p.exists()) {
            return Self::load(&path);
        }

        Ok(Self::default())
    }

    /// Apply `PORT` and `HOST`
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(
            std::env::var("HOST").ok(),
            std::env::var("PORT").ok().as_deref(),
        )
    }

    fn apply_overrides(&mut self, host: Option<String>, port: Option<&str>) -> Result<(), ConfigError> {
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            self.server.host = host;
        }

        if let Some(port) = port.map(str::trim).filter(|p| !p.is_empty()) {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT is not a valid port: {}", port)))?;
        }

        Ok(())
    }

    /// Hard errors
    fn check(&self) -> Result<(), ConfigError> {
        if self.transcoder.audio_bitrate_kbps == 0 {
            return Err(ConfigError::Invalid(
                "transcoder.audio_bitrate_kbps cannot be 0".to_string(),
            ));
        }
        if self.extractor.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "extractor.timeout_seconds cannot be 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Non-fatal findings, logged at startup
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.probe.timeout_ms == 0 {
            warnings.push("probe.timeout_ms is 0; every size probe will time out".to_string());
        }
        if self.transcoder.audio_bitrate_kbps != DEFAULT_BITRATE_KBPS {
            warnings.push(format!(
                "transcoder.audio_bitrate_kbps is {} (clients expect {})",
                self.transcoder.audio_bitrate_kbps, DEFAULT_BITRATE_KBPS
            ));
        }
        if self.server.validation_status == ValidationStatus::InternalError {
            warnings.push("server.validation_status reports bad input as 500".to_string());
        }
        if let Some(path) = &self.extractor.cookies_path {
            if !Path::new(path).exists() {
                warnings.push(format!("extractor.cookies_path does not exist: {}", path));
            }
        }
        if self.server.site_name.trim().is_empty() {
            warnings.push("server.site_name is empty".to_string());
        }

        warnings
    }
}

/// `<config dir>/ytdl-relay/config.toml`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ytdl-relay").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::extractors::ExtractorMode;
    use std::io::Write;

    #[test]
    fn defaults_match_original_server() {
        let config = Config::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.server.site_name, "Ytdl.fun");
        assert_eq!(config.transcoder.audio_bitrate_kbps, 128);
        assert_eq!(config.server.validation_status.status_code(), 400);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn loads_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8080
validation_status = "internal_error"

[extractor]
mode = "python"
proxy = "socks5://127.0.0.1:1080"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.validation_status, ValidationStatus::InternalError);
        assert_eq!(config.extractor.mode, ExtractorMode::Python);
        assert_eq!(config.extractor.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
        assert_eq!(config.probe.timeout_ms, 5000);
        assert_eq!(config.validate().len(), 1);
    }

    #[test]
    fn rejects_bad_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = \"many\"").unwrap();
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[transcoder]\naudio_bitrate_kbps = 0").unwrap();
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Invalid(_))));

        let missing = Path::new("/nonexistent/ytdl-relay.toml");
        assert!(matches!(Config::load_or_default(Some(missing)), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn env_style_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(Some("127.0.0.1".to_string()), Some("4000"))
            .unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 4000);

        assert!(config.apply_overrides(None, Some("http")).is_err());
        config.apply_overrides(Some(" ".to_string()), None).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
