//! # LintHub Core
//!
//! Core library of the LintHub analysis service: the job lifecycle
//! orchestrator, the bounded execution pool, rule configuration handling
//! and the persistence ports backing them.
//!
//! ## Overview
//!
//! A submitted repository locator becomes a job that moves strictly
//! forward through `pending`, `fetching`, `analyzing` and one of the
//! terminal states. Every step is appended to the job's durable log and
//! broadcast to live subscribers. Rule configurations are stored as
//! Checkstyle documents and exposed in structured form through a
//! bidirectional mapper.
//!
//! ## Architecture
//!
//! - [`orchestrator`]: drives one job through its lifecycle
//! - [`pool`]: warm workers, bounded backlog, synchronous rejection
//! - [`events`]: durable append plus broadcast per job
//! - [`fetch`] / [`engine`]: the external collaborators (git, Checkstyle)
//! - [`rules`]: structured/XML configuration mapper and its service
//! - [`relativize`]: display paths for findings
//! - [`persistence`]: Postgres-backed storage ports

#![allow(missing_docs)]

/// Analysis engine invocation and report parsing.
pub mod engine;

/// Error types shared across the pipeline.
pub mod error;

/// Per-job event topics with durable history.
pub mod events;

/// Repository fetching and working-tree selection.
pub mod fetch;

/// Job lifecycle orchestration.
pub mod orchestrator;

/// Storage ports and their Postgres implementations.
pub mod persistence;

/// Bounded execution pool.
pub mod pool;

/// Layered path relativization for finding display.
pub mod relativize;

/// Rule configuration mapper and service.
pub mod rules;

pub use engine::{CheckstyleEngine, RuleEngine};
pub use error::{AnalysisError, Result};
pub use events::JobEventBus;
pub use fetch::{FetchedTree, GitFetcher, RepoFetcher};
pub use orchestrator::JobOrchestrator;
pub use pool::{AnalysisPool, PoolLimits};
pub use rules::RulesService;
