//! Shared configuration loading for Linthub.
//!
//! Centralizes environment-driven configuration so the server binary and
//! the test harnesses agree on defaults and validation rules.

pub mod loader;
pub mod models;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigWarning, ConfigWarnings};
pub use models::{
    Config, ConfigMetadata, CorsConfig, DatabaseConfig, EngineConfig, FetchConfig, PoolConfig,
    ServerConfig,
};
