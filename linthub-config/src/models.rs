#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub pool: PoolConfig,
    pub engine: EngineConfig,
    pub fetch: FetchConfig,
    pub cors: CorsConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub primary_url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            primary_url: None,
            max_connections: 10,
        }
    }
}

/// Limits of the bounded analysis pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Worker tasks spawned at startup.
    pub warm_workers: usize,
    /// Upper bound on concurrently running jobs.
    pub max_workers: usize,
    /// Queued submissions tolerated beyond the running ones.
    pub backlog: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            warm_workers: 2,
            max_workers: 5,
            backlog: 10,
        }
    }
}

/// External analysis engine invocation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub command: String,
    pub extra_args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            command: "checkstyle".to_string(),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub git_command: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            git_command: "git".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn is_wildcard_included(&self) -> bool {
        self.allowed_origins
            .iter()
            .any(|origin| origin.trim() == "*")
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        CorsConfig {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub env_file_loaded: bool,
}
