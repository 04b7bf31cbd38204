//! Postgres-backed implementations of the persistence ports.
//!
//! Rows are loaded into plain structs and mapped explicitly so enum
//! columns stay readable strings in the database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use linthub_model::{Finding, Job, JobStatus, LogEntry, LogLevel, Severity};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AnalysisError, Result};
use crate::persistence::ports::{
    FindingRepository, JobRepository, LogRepository, RuleConfigRepository,
    StoredConfig,
};

#[derive(Debug, Clone)]
pub struct PostgresJobRepository {
    pool: PgPool,
}

impl PostgresJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: JobRow) -> Result<Job> {
        let status = JobStatus::parse(&row.status).ok_or_else(|| {
            AnalysisError::Internal(format!(
                "Unknown job status in store: {}",
                row.status
            ))
        })?;
        Ok(Job {
            id: row.id,
            repo_url: row.repo_url,
            status,
            error_message: row.error_message,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    repo_url: String,
    status: String,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl JobRepository for PostgresJobRepository {
    async fn create(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, repo_url, status, error_message, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(job.id)
        .bind(&job.repo_url)
        .bind(job.status.as_str())
        .bind(job.error_message.as_deref())
        .bind(job.created_at)
        .execute(self.pool())
        .await
        .map_err(|e| {
            AnalysisError::Internal(format!("Failed to create job: {e}"))
        })?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, repo_url, status, error_message, created_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            AnalysisError::Internal(format!("Failed to load job: {e}"))
        })?;

        row.map(Self::map_row).transpose()
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        // The predecessor filter makes the update a no-op when the stored
        // status cannot legally move to the requested one, so two racing
        // writers cannot walk a job backwards.
        let allowed: Vec<&str> = JobStatus::ALL
            .iter()
            .filter(|from| from.can_transition_to(status))
            .map(JobStatus::as_str)
            .collect();

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2,
                error_message = $3
            WHERE id = $1
              AND status = ANY($4)
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error_message)
        .bind(&allowed)
        .execute(self.pool())
        .await
        .map_err(|e| {
            AnalysisError::Internal(format!("Failed to update job status: {e}"))
        })?;

        if result.rows_affected() == 0 {
            return match self.get(id).await? {
                None => Err(AnalysisError::NotFound(format!("job {id}"))),
                Some(job) => Err(AnalysisError::Internal(format!(
                    "Refusing status transition {} -> {} for job {id}",
                    job.status.as_str(),
                    status.as_str()
                ))),
            };
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresFindingRepository {
    pool: PgPool,
}

impl PostgresFindingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: FindingRow) -> Result<Finding> {
        let severity = Severity::parse(&row.severity).ok_or_else(|| {
            AnalysisError::Internal(format!(
                "Unknown severity in store: {}",
                row.severity
            ))
        })?;
        let line = u32::try_from(row.line).map_err(|_| {
            AnalysisError::Internal(format!(
                "Negative line number in store: {}",
                row.line
            ))
        })?;
        Ok(Finding {
            file_path: row.file_path,
            line,
            severity,
            message: row.message,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FindingRow {
    file_path: String,
    line: i64,
    severity: String,
    message: String,
}

#[async_trait]
impl FindingRepository for PostgresFindingRepository {
    async fn insert_many(
        &self,
        job_id: Uuid,
        findings: &[Finding],
    ) -> Result<()> {
        if findings.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool().begin().await.map_err(|e| {
            AnalysisError::Internal(format!(
                "Failed to open findings transaction: {e}"
            ))
        })?;

        for finding in findings {
            sqlx::query(
                r#"
                INSERT INTO findings (job_id, file_path, line, severity, message)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(job_id)
            .bind(&finding.file_path)
            .bind(i64::from(finding.line))
            .bind(finding.severity.as_str())
            .bind(&finding.message)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AnalysisError::Internal(format!("Failed to insert finding: {e}"))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AnalysisError::Internal(format!("Failed to commit findings: {e}"))
        })?;

        Ok(())
    }

    async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<Finding>> {
        let rows = sqlx::query_as::<_, FindingRow>(
            r#"
            SELECT file_path, line, severity, message
            FROM findings
            WHERE job_id = $1
            ORDER BY seq
            "#,
        )
        .bind(job_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AnalysisError::Internal(format!("Failed to load findings: {e}"))
        })?;

        rows.into_iter().map(Self::map_row).collect()
    }
}

#[derive(Debug, Clone)]
pub struct PostgresLogRepository {
    pool: PgPool,
}

impl PostgresLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: LogRow) -> Result<LogEntry> {
        let level = LogLevel::parse(&row.level).ok_or_else(|| {
            AnalysisError::Internal(format!(
                "Unknown log level in store: {}",
                row.level
            ))
        })?;
        Ok(LogEntry {
            level,
            message: row.message,
            timestamp: row.timestamp,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    level: String,
    message: String,
    timestamp: DateTime<Utc>,
}

#[async_trait]
impl LogRepository for PostgresLogRepository {
    async fn append(
        &self,
        job_id: Uuid,
        level: LogLevel,
        message: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO job_logs (job_id, level, message, timestamp)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(job_id)
        .bind(level.as_str())
        .bind(message)
        .bind(timestamp)
        .execute(self.pool())
        .await
        .map_err(|e| {
            AnalysisError::Internal(format!("Failed to append job log: {e}"))
        })?;

        Ok(())
    }

    async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query_as::<_, LogRow>(
            r#"
            SELECT level, message, timestamp
            FROM job_logs
            WHERE job_id = $1
            ORDER BY seq
            "#,
        )
        .bind(job_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AnalysisError::Internal(format!("Failed to load job logs: {e}"))
        })?;

        rows.into_iter().map(Self::map_row).collect()
    }
}

#[derive(Debug, Clone)]
pub struct PostgresRuleConfigRepository {
    pool: PgPool,
}

impl PostgresRuleConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: ConfigRow) -> StoredConfig {
        StoredConfig {
            id: row.id,
            config_name: row.config_name,
            xml_content: row.xml_content,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ConfigRow {
    id: Uuid,
    config_name: String,
    xml_content: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl RuleConfigRepository for PostgresRuleConfigRepository {
    async fn get_active(&self) -> Result<Option<StoredConfig>> {
        let row = sqlx::query_as::<_, ConfigRow>(
            r#"
            SELECT id, config_name, xml_content, is_active, created_at, updated_at
            FROM rule_configurations
            WHERE is_active
            "#,
        )
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            AnalysisError::Internal(format!(
                "Failed to load active rule configuration: {e}"
            ))
        })?;

        Ok(row.map(Self::map_row))
    }

    async fn insert(&self, config: &StoredConfig) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rule_configurations
                (id, config_name, xml_content, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(config.id)
        .bind(&config.config_name)
        .bind(&config.xml_content)
        .bind(config.is_active)
        .bind(config.created_at)
        .bind(config.updated_at)
        .execute(self.pool())
        .await
        .map_err(|e| {
            AnalysisError::Internal(format!(
                "Failed to insert rule configuration: {e}"
            ))
        })?;

        Ok(())
    }

    async fn update_content(
        &self,
        id: Uuid,
        xml_content: &str,
    ) -> Result<StoredConfig> {
        let row = sqlx::query_as::<_, ConfigRow>(
            r#"
            UPDATE rule_configurations
            SET xml_content = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, config_name, xml_content, is_active, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(xml_content)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| {
            AnalysisError::Internal(format!(
                "Failed to update rule configuration: {e}"
            ))
        })?;

        row.map(Self::map_row).ok_or_else(|| {
            AnalysisError::NotFound(format!("rule configuration {id}"))
        })
    }
}
