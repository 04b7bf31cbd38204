use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Level of a durable job log line. The stored column is capped at 16
/// characters, so variants stay short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INFO" => Some(LogLevel::Info),
            "ERROR" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// One durable log line belonging to a job. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// The live broadcast frame delivered to subscribers of a job's topic.
/// Carries the same content as the durable [`LogEntry`] plus the job id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: Uuid,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(job_id: Uuid, level: LogLevel, message: impl Into<String>) -> Self {
        JobEvent {
            job_id,
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
