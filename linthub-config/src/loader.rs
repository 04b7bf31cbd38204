use std::env;

use thiserror::Error;

use crate::models::{
    Config, ConfigMetadata, CorsConfig, DatabaseConfig, EngineConfig,
    FetchConfig, PoolConfig, ServerConfig,
};

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key} must be greater than zero")]
    ZeroLimit { key: &'static str },
}

#[derive(Debug, Clone, Default)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn push(&mut self, message: impl Into<String>, hint: Option<&str>) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: hint.map(str::to_string),
        });
    }
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

/// Environment-driven configuration loader. Reads a `.env` file when one
/// is present, then individual variables with documented defaults.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    skip_env_file: bool,
}

impl ConfigLoader {
    pub fn new() -> Self {
        ConfigLoader::default()
    }

    /// Skip the `.env` lookup; used by tests that control the environment.
    pub fn without_env_file(mut self) -> Self {
        self.skip_env_file = true;
        self
    }

    pub fn load(self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded =
            !self.skip_env_file && dotenvy::dotenv().is_ok();
        let mut warnings = ConfigWarnings::default();

        let server = ServerConfig {
            host: non_empty_var("SERVER_HOST")
                .unwrap_or_else(|| ServerConfig::default().host),
            port: parse_var("SERVER_PORT")?
                .unwrap_or(ServerConfig::default().port),
        };

        let database = DatabaseConfig {
            primary_url: non_empty_var("DATABASE_URL"),
            max_connections: parse_var("DB_MAX_CONNECTIONS")?
                .unwrap_or(DatabaseConfig::default().max_connections),
        };
        if database.primary_url.is_none() {
            warnings.push(
                "DATABASE_URL is not set",
                Some("the server cannot start without a PostgreSQL URL"),
            );
        }

        let defaults = PoolConfig::default();
        let mut pool = PoolConfig {
            warm_workers: parse_var("ANALYSIS_WARM_WORKERS")?
                .unwrap_or(defaults.warm_workers),
            max_workers: parse_var("ANALYSIS_MAX_WORKERS")?
                .unwrap_or(defaults.max_workers),
            backlog: parse_var("ANALYSIS_QUEUE_DEPTH")?
                .unwrap_or(defaults.backlog),
        };
        if pool.max_workers == 0 {
            return Err(ConfigLoadError::ZeroLimit {
                key: "ANALYSIS_MAX_WORKERS",
            });
        }
        if pool.warm_workers == 0 {
            return Err(ConfigLoadError::ZeroLimit {
                key: "ANALYSIS_WARM_WORKERS",
            });
        }
        if pool.warm_workers > pool.max_workers {
            warnings.push(
                format!(
                    "ANALYSIS_WARM_WORKERS ({}) exceeds ANALYSIS_MAX_WORKERS ({}); clamping",
                    pool.warm_workers, pool.max_workers
                ),
                None,
            );
            pool.warm_workers = pool.max_workers;
        }

        let engine = EngineConfig {
            command: non_empty_var("ENGINE_COMMAND")
                .unwrap_or_else(|| EngineConfig::default().command),
            extra_args: non_empty_var("ENGINE_ARGS")
                .map(|raw| {
                    raw.split_whitespace().map(str::to_string).collect()
                })
                .unwrap_or_default(),
        };

        let fetch = FetchConfig {
            git_command: non_empty_var("GIT_COMMAND")
                .unwrap_or_else(|| FetchConfig::default().git_command),
        };

        let cors = CorsConfig {
            allowed_origins: non_empty_var("CORS_ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or_else(|| CorsConfig::default().allowed_origins),
        };

        Ok(ConfigLoad {
            config: Config {
                server,
                database,
                pool,
                engine,
                fetch,
                cors,
                metadata: ConfigMetadata { env_file_loaded },
            },
            warnings,
        })
    }
}

fn non_empty_var(key: &'static str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: std::str::FromStr>(
    key: &'static str,
) -> Result<Option<T>, ConfigLoadError> {
    match non_empty_var(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigLoadError::InvalidNumber { key, value: raw }),
        None => Ok(None),
    }
}
