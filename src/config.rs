//! Configuration management for the scorestream service.
//!
//! Sources, in order of precedence (later ones override earlier ones):
//! 1. Default configuration (embedded in binary)
//! 2. System-wide configuration file (`/etc/scorestream/config.toml`)
//! 3. User-specified configuration file (`--config`)
//! 4. Environment variables prefixed with `SCORESTREAM_`, nested keys joined
//!    by `__` (e.g. `SCORESTREAM_UPSTREAM__MAX_RETRIES=5`)
//! 5. Command-line arguments

use crate::ingest::Backoff;
use clap::Parser;
use config::{Config, ConfigError, Environment};
use scorestore::EngineConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");
const DEFAULT_CONFIG_PATH: &str = "/etc/scorestream/config.toml";

/// Command-line arguments.
#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE", env = "SCORESTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP listen address
    #[arg(long)]
    host: Option<String>,

    /// HTTP listen port
    #[arg(long)]
    port: Option<u16>,

    /// Server-sent event stream to ingest
    #[arg(long, value_name = "URL")]
    upstream_url: Option<String>,

    /// Consecutive failed reconnects before ingestion gives up
    #[arg(long)]
    max_retries: Option<u32>,

    /// Storage engine type ("duckdb" or "memory")
    #[arg(long)]
    engine: Option<String>,

    /// Storage engine connection string
    #[arg(long)]
    engine_connection: Option<String>,

    /// Storage engine options (key=value, repeatable)
    #[arg(long)]
    engine_options: Option<Vec<String>>,
}

/// Complete service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub engine: EngineConfig,
    pub indexes: IndexConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upstream stream location and reconnect policy.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub url: String,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl UpstreamConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
            self.backoff_multiplier,
        )
        .with_max_retries(self.max_retries)
    }
}

/// Names of the two indexes in the storage engine.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    pub students: String,
    pub exams: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            students: "students".to_string(),
            exams: "exams".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            upstream: UpstreamConfig {
                url: "http://live-test-scores.herokuapp.com/scores".to_string(),
                initial_backoff_ms: 500,
                max_backoff_ms: 30_000,
                backoff_multiplier: 2.0,
                max_retries: None,
            },
            engine: EngineConfig::default(),
            indexes: IndexConfig::default(),
        }
    }
}

impl Settings {
    /// Loads configuration from all available sources.
    pub fn new(cli: CliArgs) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(config::File::from_str(
            DEFAULT_CONFIG,
            config::FileFormat::Toml,
        ));

        if let Ok(metadata) = std::fs::metadata(DEFAULT_CONFIG_PATH) {
            if metadata.is_file() {
                builder = builder.add_source(config::File::from(PathBuf::from(DEFAULT_CONFIG_PATH)));
            }
        }

        if let Some(ref config_path) = cli.config {
            builder = builder.add_source(config::File::from(config_path.clone()));
        }

        builder = builder.add_source(
            Environment::with_prefix("SCORESTREAM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(ref host) = cli.host {
            builder = builder.set_override("server.host", host.as_str())?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(ref url) = cli.upstream_url {
            builder = builder.set_override("upstream.url", url.as_str())?;
        }
        if let Some(max_retries) = cli.max_retries {
            builder = builder.set_override("upstream.max_retries", i64::from(max_retries))?;
        }
        if let Some(ref engine) = cli.engine {
            builder = builder.set_override("engine.engine", engine.as_str())?;
        }
        if let Some(ref connection) = cli.engine_connection {
            builder = builder.set_override("engine.connection", connection.as_str())?;
        }
        if let Some(ref options) = cli.engine_options {
            builder = builder.set_override("engine.options", EngineConfig::parse_options(options))?;
        }

        builder.build()?.try_deserialize()
    }
}
