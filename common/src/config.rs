// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use config::{Config as ConfigFile, File, Environment};

/// Central configuration for the gateway
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub gateway_addr: String,
    pub log_level: String,
    /// Release tag attached to every reported request outcome
    pub release: String,

    pub sessions: SessionConfig,
    pub sockets: SocketConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of a stored session record
    pub ttl_seconds: i64,
    /// How often expired records are swept from the token store
    pub sweep_interval_seconds: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SocketConfig {
    pub heartbeat_interval_seconds: u64,
    pub client_timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_addr: "127.0.0.1:8787".to_string(),
            log_level: "info".to_string(),
            release: "dev".to_string(),

            sessions: SessionConfig::default(),
            sockets: SocketConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 86400,
            sweep_interval_seconds: 3600,
        }
    }
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: 5,
            client_timeout_seconds: 30,
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let config = ConfigFile::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Environment variables with prefix "APP", e.g. APP__SESSIONS__TTL_SECONDS
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load from files, falling back to plain environment variables
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");

                let defaults = Self::default();

                let gateway_addr = env::var("GATEWAY_ADDR")
                    .unwrap_or(defaults.gateway_addr);

                let log_level = env::var("LOG_LEVEL")
                    .unwrap_or(defaults.log_level);

                let release = env::var("RELEASE")
                    .unwrap_or(defaults.release);

                let ttl_seconds = parse_var("SESSION_TTL")
                    .unwrap_or(defaults.sessions.ttl_seconds);

                let sweep_interval_seconds = parse_var("SESSION_SWEEP_INTERVAL")
                    .unwrap_or(defaults.sessions.sweep_interval_seconds);

                let heartbeat_interval_seconds = parse_var("SOCKET_HEARTBEAT")
                    .unwrap_or(defaults.sockets.heartbeat_interval_seconds);

                let client_timeout_seconds = parse_var("SOCKET_TIMEOUT")
                    .unwrap_or(defaults.sockets.client_timeout_seconds);

                Self {
                    gateway_addr,
                    log_level,
                    release,
                    sessions: SessionConfig {
                        ttl_seconds,
                        sweep_interval_seconds,
                    },
                    sockets: SocketConfig {
                        heartbeat_interval_seconds,
                        client_timeout_seconds,
                    },
                }
            }
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}
