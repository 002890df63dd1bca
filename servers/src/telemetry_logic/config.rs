use anyhow::{Context, Result};
use clap::Parser;
use lib_telemetry::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine configuration used when no `--engine-config-path` is given.
const DEFAULT_ENGINE_CONFIG: &str = include_str!("../../config/engine.json");

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Robot telemetry aggregation server", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "TELEMETRY_PORT", help = "Port for the history / realtime HTTP server.")]
    pub port: Option<u16>,

    #[clap(long, env = "TELEMETRY_UDP_ADDR", help = "Address the UDP sample ingress binds to.")]
    pub udp_addr: Option<String>,

    #[clap(long, env = "TELEMETRY_CONFIG_PATH", help = "Path to the JSON server configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "TELEMETRY_ENGINE_CONFIG_PATH", help = "Path to the JSON engine (sources) configuration.")]
    pub engine_config_path: Option<PathBuf>,

    #[clap(long, env = "TELEMETRY_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "TELEMETRY_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "TELEMETRY_LOG_PREFIX", help = "File name prefix of this server's log files.")]
    pub log_prefix: Option<String>,

    #[clap(long, env = "TELEMETRY_ALLOWED_ORIGIN", help = "Origin allowed by CORS on the HTTP endpoints.")]
    pub allowed_origin: Option<String>,

    #[clap(long, env = "TELEMETRY_MONITOR_INTERVAL_SECONDS", help = "Interval in seconds between ingress statistics reports.")]
    pub monitor_interval_seconds: Option<u64>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            udp_addr: other.udp_addr.or(self.udp_addr),
            config_path: other.config_path.or(self.config_path),
            engine_config_path: other.engine_config_path.or(self.engine_config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            log_prefix: other.log_prefix.or(self.log_prefix),
            allowed_origin: other.allowed_origin.or(self.allowed_origin),
            monitor_interval_seconds: other.monitor_interval_seconds.or(self.monitor_interval_seconds),
        }
    }

    fn defaults() -> Config {
        Config {
            port: Some(8081),
            udp_addr: Some("0.0.0.0:9100".to_string()),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            log_prefix: Some("server_telemetry".to_string()),
            allowed_origin: Some("http://localhost:8080".to_string()),
            monitor_interval_seconds: Some(30),
            ..Default::default()
        }
    }

    /// Fills every field that is still unset and validates the addresses.
    pub fn into_settings(self) -> Result<Settings> {
        let merged = Config::defaults().merge(self);
        let udp_addr = merged.udp_addr.unwrap_or_default();
        Ok(Settings {
            port: merged.port.unwrap_or(8081),
            udp_addr: udp_addr
                .parse()
                .with_context(|| format!("Invalid UDP ingress address: {udp_addr}"))?,
            engine_config_path: merged.engine_config_path,
            log_dir: merged.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
            log_level: merged.log_level.unwrap_or_else(|| "info".to_string()),
            log_prefix: merged.log_prefix.unwrap_or_else(|| "server_telemetry".to_string()),
            allowed_origin: merged.allowed_origin.unwrap_or_default(),
            monitor_interval: Duration::from_secs(merged.monitor_interval_seconds.unwrap_or(30).max(1)),
        })
    }
}

/// Fully resolved server settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub udp_addr: SocketAddr,
    pub engine_config_path: Option<PathBuf>,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub log_prefix: String,
    pub allowed_origin: String,
    pub monitor_interval: Duration,
}

impl Settings {
    /// Loads the engine configuration from `engine_config_path`, or the
    /// bundled robot configuration.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        match &self.engine_config_path {
            Some(path) => EngineConfig::from_file(path)
                .with_context(|| format!("Failed to load engine config {}", path.display())),
            None => EngineConfig::from_json_str(DEFAULT_ENGINE_CONFIG).context("Bundled engine config is invalid"),
        }
    }
}

/// Reads an optional JSON config file. A missing or unreadable file is
/// logged and ignored.
fn load_file_config(path: &Path) -> Option<Config> {
    if !path.exists() {
        log::info!("Config file not found at {}. Using defaults and environment/CLI variables.", path.display());
        return None;
    }
    match fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str::<Config>(&text) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to parse config file {}: {}. Falling back to other sources.", path.display(), e);
                None
            }
        },
        Err(e) => {
            log::warn!("Failed to read config file {}: {}. Falling back to other sources.", path.display(), e);
            None
        }
    }
}

/// Layers defaults, then the config file, then environment / CLI.
fn resolve(cli: Config) -> Config {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("server_telemetry.conf"));

    let mut current = Config::defaults();
    if let Some(file_config) = load_file_config(&config_file_path) {
        current = current.merge(file_config);
    }
    current.merge(cli)
}

pub fn load_config() -> Config {
    // A .env file only supplies variables that are not already set.
    dotenvy::dotenv().ok();
    resolve(Config::parse())
}
