//! Core data model definitions shared across Linthub crates.
#![allow(missing_docs)]

pub mod api;
pub mod finding;
pub mod job;
pub mod log;
pub mod rules;

pub use api::{JobStatusResponse, SubmitJobRequest, SubmitJobResponse};
pub use finding::{Finding, Severity};
pub use job::{Job, JobStatus};
pub use log::{JobEvent, LogEntry, LogLevel};
pub use rules::{ActiveRules, RuleSet, RuleSetPatch};
