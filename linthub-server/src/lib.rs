//! # LintHub Server
//!
//! HTTP and WebSocket gateway for the LintHub static-analysis service.
//!
//! The binary in `main.rs` loads configuration, connects the Postgres
//! store, wires the orchestrator and exposes the router assembled in
//! [`routes`]. Everything here is also usable from integration tests,
//! which build an [`AppState`] over in-memory stores instead of a live
//! database.

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
pub use infra::errors::{AppError, AppResult};
