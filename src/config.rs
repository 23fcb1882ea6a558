// Configuration management for the host/route enumerator
// Supports CLI arguments, config file (TOML), and environment variables

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

use crate::error::RetryConfig;

/// Resolve a list of hostnames, look up the network route each one lives
/// in, and store the host/route map in SQLite
#[derive(Parser, Debug, Clone)]
#[command(name = "enumerate")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to domain list
    #[arg(short, long, env = "ENUMERATE_LIST")]
    pub list: Option<PathBuf>,

    /// Path to output database (replaced on every run)
    #[arg(short, long, env = "ENUMERATE_DB")]
    pub db: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, env = "ENUMERATE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Path to configuration file
    #[arg(short, long, env = "ENUMERATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Registry lookup executable, searched for on PATH
    #[arg(long, env = "ENUMERATE_LOOKUP_TOOL")]
    pub lookup_tool: Option<String>,

    /// Timeout for one lookup tool invocation, in seconds
    #[arg(long, env = "ENUMERATE_LOOKUP_TIMEOUT")]
    pub lookup_timeout: Option<u64>,

    /// Number of hostnames resolved ahead of the one being recorded
    #[arg(long, env = "ENUMERATE_RESOLVE_CONCURRENCY")]
    pub resolve_concurrency: Option<usize>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Configuration file structure (TOML format)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub lookup: LookupConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Newline-delimited hostname list
    #[serde(default = "default_list")]
    pub list: PathBuf,

    /// SQLite output file
    #[serde(default = "default_db")]
    pub db: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Lookup executable name or path
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Per-invocation timeout in seconds
    #[serde(default = "default_lookup_timeout")]
    pub timeout_seconds: u64,

    /// Attempts per query, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_resolve_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_list() -> PathBuf {
    PathBuf::from("./enumerate.txt")
}
fn default_db() -> PathBuf {
    PathBuf::from("./enumerate.db")
}
fn default_tool() -> String {
    "whois".to_string()
}
fn default_lookup_timeout() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    1
}
fn default_retry_delay() -> u64 {
    500
}
fn default_resolve_concurrency() -> usize {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            list: default_list(),
            db: default_db(),
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        LookupConfig {
            tool: default_tool(),
            timeout_seconds: default_lookup_timeout(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            concurrency: default_resolve_concurrency(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

/// Merged configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub list: PathBuf,
    pub db: PathBuf,
    pub log_level: Level,
    pub lookup_tool: String,
    pub lookup_timeout: Duration,
    pub retry: RetryConfig,
    pub resolve_concurrency: usize,
    pub json: bool,
    /// Config file that was loaded, if any
    pub source: Option<PathBuf>,
}

impl Config {
    /// Load configuration from all sources (CLI args, config file, defaults)
    /// Priority: CLI args / environment variables > Config file > Defaults
    pub fn load() -> anyhow::Result<Self> {
        let cli_args = CliArgs::parse();

        let (config_file, source) = if let Some(config_path) = &cli_args.config {
            let config_content = std::fs::read_to_string(config_path)?;
            (
                toml::from_str::<ConfigFile>(&config_content)?,
                Some(config_path.clone()),
            )
        } else {
            let default_path = PathBuf::from("enumerate.toml");
            if default_path.exists() {
                let config_content = std::fs::read_to_string(&default_path)?;
                (toml::from_str::<ConfigFile>(&config_content)?, Some(default_path))
            } else {
                (ConfigFile::default(), None)
            }
        };

        Self::merge(cli_args, config_file, source)
    }

    fn merge(
        cli_args: CliArgs,
        config_file: ConfigFile,
        source: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let log_level = parse_log_level(
            cli_args
                .log_level
                .as_deref()
                .unwrap_or(&config_file.logging.level),
        )?;

        let lookup_timeout = Duration::from_secs(
            cli_args
                .lookup_timeout
                .unwrap_or(config_file.lookup.timeout_seconds),
        );
        if lookup_timeout.is_zero() {
            anyhow::bail!("Lookup timeout must be at least one second");
        }

        let retry = RetryConfig {
            max_attempts: config_file.lookup.max_attempts.max(1),
            initial_delay_ms: config_file.lookup.retry_delay_ms,
            ..RetryConfig::default()
        };

        Ok(Config {
            list: cli_args.list.unwrap_or(config_file.paths.list),
            db: cli_args.db.unwrap_or(config_file.paths.db),
            log_level,
            lookup_tool: cli_args.lookup_tool.unwrap_or(config_file.lookup.tool),
            lookup_timeout,
            retry,
            resolve_concurrency: cli_args
                .resolve_concurrency
                .unwrap_or(config_file.resolver.concurrency)
                .max(1),
            json: cli_args.json,
            source,
        })
    }
}

fn parse_log_level(level_str: &str) -> anyhow::Result<Level> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(Level::ERROR),
        "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "trace" => Ok(Level::TRACE),
        _ => Err(anyhow::anyhow!("Invalid log level: {}", level_str)),
    }
}
