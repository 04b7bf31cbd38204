use async_trait::async_trait;
use chrono::{DateTime, Utc};
use linthub_model::{Finding, Job, JobStatus, LogEntry, LogLevel};
use uuid::Uuid;

use crate::error::Result;

/// Durable store for jobs. The status column only ever moves forward;
/// `update_status` refuses anything else so the invariant holds even
/// under a buggy caller.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Job>>;

    /// Persist a status change. `error_message` must be `Some` exactly
    /// when `status` is `Failed`.
    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<()>;
}

#[async_trait]
pub trait FindingRepository: Send + Sync {
    /// Bulk-insert the findings of one finished analysis.
    async fn insert_many(
        &self,
        job_id: Uuid,
        findings: &[Finding],
    ) -> Result<()>;

    /// Findings in insertion order.
    async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<Finding>>;
}

#[async_trait]
pub trait LogRepository: Send + Sync {
    async fn append(
        &self,
        job_id: Uuid,
        level: LogLevel,
        message: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()>;

    /// Log history in append order.
    async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<LogEntry>>;
}

/// A stored rule configuration row. The XML is the source of truth; the
/// structured form is derived on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredConfig {
    pub id: Uuid,
    pub config_name: String,
    pub xml_content: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredConfig {
    pub fn new_active(
        config_name: impl Into<String>,
        xml_content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        StoredConfig {
            id: Uuid::new_v4(),
            config_name: config_name.into(),
            xml_content: xml_content.into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
pub trait RuleConfigRepository: Send + Sync {
    async fn get_active(&self) -> Result<Option<StoredConfig>>;

    /// Insert a configuration row. The partial unique index on
    /// `is_active` guards the at-most-one-active invariant.
    async fn insert(&self, config: &StoredConfig) -> Result<()>;

    /// Replace the XML of an existing row in place, bumping `updated_at`,
    /// and return the updated row.
    async fn update_content(
        &self,
        id: Uuid,
        xml_content: &str,
    ) -> Result<StoredConfig>;
}
