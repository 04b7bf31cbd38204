//! # LintHub Server
//!
//! Static-analysis job service.
//!
//! ## Overview
//!
//! LintHub accepts repository locators over HTTP, clones them, runs a
//! Checkstyle-compatible engine against the tree and streams progress
//! to subscribers while persisting every step:
//!
//! - **Job lifecycle**: pending, fetching, analyzing, then completed or
//!   failed, with forward-only transitions
//! - **Bounded execution**: a warm worker set that grows to a hard cap
//!   and rejects work beyond its backlog
//! - **Live logs**: WebSocket streams backed by a durable per-job log
//! - **Rule management**: structured rule editing mapped onto the raw
//!   engine configuration document
//!
//! ## Architecture
//!
//! The server is built on Axum and uses:
//! - PostgreSQL for jobs, findings, logs and rule configurations
//! - git for shallow repository fetches
//! - An external Checkstyle process for the actual analysis

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linthub_config::{Config, ConfigLoad, ConfigLoader};
use linthub_core::{
    AnalysisPool, CheckstyleEngine, GitFetcher, JobEventBus, JobOrchestrator,
    PoolLimits, RepoFetcher, RuleEngine, RulesService,
    persistence::{
        self,
        ports::{
            FindingRepository, JobRepository, LogRepository,
            RuleConfigRepository,
        },
        postgres::{
            PostgresFindingRepository, PostgresJobRepository,
            PostgresLogRepository, PostgresRuleConfigRepository,
        },
    },
};
use linthub_server::{AppState, routes};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "linthub-server")]
#[command(
    about = "Static-analysis job service with bounded execution and live log streaming"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Run database preflight checks and exit
    Preflight,
    /// Apply database migrations and exit (runs preflight first)
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(command) = cli.command {
        match command {
            Command::Db(DbCommand::Preflight) => {
                run_db_preflight(&cli.serve).await?;
                return Ok(());
            }
            Command::Db(DbCommand::Migrate) => {
                run_db_migrate(&cli.serve).await?;
                return Ok(());
            }
        }
    }

    run_server(cli.serve).await
}

async fn run_db_preflight(args: &ServeArgs) -> anyhow::Result<()> {
    let ConfigBootstrap {
        config,
        database_url,
    } = load_runtime_config(args)?;
    let pool =
        persistence::connect(&database_url, config.database.max_connections)
            .await
            .context("failed to connect to PostgreSQL for preflight")?;
    persistence::preflight(&pool)
        .await
        .context("database preflight failed")?;
    info!("Database preflight passed");
    Ok(())
}

async fn run_db_migrate(args: &ServeArgs) -> anyhow::Result<()> {
    let ConfigBootstrap {
        config,
        database_url,
    } = load_runtime_config(args)?;
    let pool =
        persistence::connect(&database_url, config.database.max_connections)
            .await
            .context("failed to connect to PostgreSQL for migration")?;
    persistence::initialize_schema(&pool)
        .await
        .context("database migration failed")?;
    info!("Database migrations applied successfully");
    Ok(())
}

struct ConfigBootstrap {
    config: Arc<Config>,
    database_url: String,
}

fn load_runtime_config(args: &ServeArgs) -> anyhow::Result<ConfigBootstrap> {
    let ConfigLoad {
        mut config,
        warnings,
    } = ConfigLoader::new()
        .load()
        .context("failed to load configuration")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host.clone() {
        config.server.host = host;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    // Quieter defaults; override via RUST_LOG.
                    "info,tower_http=warn".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }

    if !warnings.is_empty() {
        for warning in &warnings.items {
            match &warning.hint {
                Some(hint) => {
                    warn!(message = %warning.message, hint = %hint, "configuration warning")
                }
                None => {
                    warn!(message = %warning.message, "configuration warning")
                }
            }
        }
    }

    info!(
        pool.warm_workers = config.pool.warm_workers,
        pool.max_workers = config.pool.max_workers,
        pool.backlog = config.pool.backlog,
        "analysis pool configuration in effect"
    );
    info!(
        engine.command = %config.engine.command,
        fetch.git_command = %config.fetch.git_command,
        "external tool commands resolved"
    );

    let Some(database_url) = config.database.primary_url.clone() else {
        error!("DATABASE_URL must be provided for PostgreSQL connections");
        return Err(anyhow::anyhow!(
            "No PostgreSQL connection configuration found"
        ));
    };

    if !(database_url.starts_with("postgres://")
        || database_url.starts_with("postgresql://"))
    {
        error!("Only PostgreSQL database URLs are supported");
        return Err(anyhow::anyhow!(
            "Invalid database URL: must start with postgres:// or postgresql://"
        ));
    }

    Ok(ConfigBootstrap {
        config: Arc::new(config),
        database_url,
    })
}

async fn wire_app_resources(
    config: Arc<Config>,
    database_url: &str,
) -> anyhow::Result<AppState> {
    let pool = match persistence::connect(
        database_url,
        config.database.max_connections,
    )
    .await
    {
        Ok(pool) => {
            info!("Successfully connected to PostgreSQL");
            pool
        }
        Err(connect_error) => {
            error!(error = %connect_error, "PostgreSQL connection failed");
            return Err(anyhow::anyhow!(
                "Database connection failed: {connect_error}"
            ));
        }
    };

    match persistence::initialize_schema(&pool).await {
        Ok(()) => info!("Database schema initialized successfully"),
        Err(e) => {
            error!("Failed to initialize database schema: {e}");
            return Err(anyhow::anyhow!("Database migration failed: {e}"));
        }
    }

    let jobs: Arc<dyn JobRepository> =
        Arc::new(PostgresJobRepository::new(pool.clone()));
    let findings: Arc<dyn FindingRepository> =
        Arc::new(PostgresFindingRepository::new(pool.clone()));
    let log_store: Arc<dyn LogRepository> =
        Arc::new(PostgresLogRepository::new(pool.clone()));
    let config_store: Arc<dyn RuleConfigRepository> =
        Arc::new(PostgresRuleConfigRepository::new(pool.clone()));

    let events = Arc::new(JobEventBus::new(log_store));
    let rules = Arc::new(RulesService::new(config_store));
    let active = rules.ensure_default().await?;
    info!(config = %active.config_name, "active rule configuration ready");

    let fetcher: Arc<dyn RepoFetcher> =
        Arc::new(GitFetcher::new(config.fetch.git_command.clone()));
    let engine: Arc<dyn RuleEngine> = Arc::new(CheckstyleEngine::new(
        config.engine.command.clone(),
        config.engine.extra_args.clone(),
    ));

    let analysis_pool = Arc::new(AnalysisPool::new(PoolLimits {
        warm_workers: config.pool.warm_workers,
        max_workers: config.pool.max_workers,
        backlog: config.pool.backlog,
    }));

    let orchestrator = Arc::new(JobOrchestrator::new(
        jobs,
        findings,
        Arc::clone(&events),
        Arc::clone(&rules),
        fetcher,
        engine,
        analysis_pool,
    ));

    Ok(AppState::new(config, orchestrator, rules, events))
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let ConfigBootstrap {
        config,
        database_url,
    } = load_runtime_config(&args)?;

    let state = wire_app_resources(Arc::clone(&config), &database_url).await?;
    let app = routes::create_app(state);

    let addr: SocketAddr =
        format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .with_context(|| {
                format!(
                    "invalid listen address {}:{}",
                    config.server.host, config.server.port
                )
            })?;

    info!(
        "Starting LintHub server (HTTP) on {}:{}",
        config.server.host, config.server.port
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
