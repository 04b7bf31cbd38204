use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An analysis job: one submitted repository locator and its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub repo_url: String,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Job {
            id: Uuid::new_v4(),
            repo_url: repo_url.into(),
            status: JobStatus::Pending,
            error_message: None,
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle of a job. Transitions only move forward; `Completed` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Fetching,
    Analyzing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Fetching,
        JobStatus::Analyzing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Fetching => "fetching",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(JobStatus::Pending),
            "fetching" => Some(JobStatus::Fetching),
            "analyzing" => Some(JobStatus::Analyzing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving to `next` respects the one-directional machine.
    /// Failure may attach after any non-terminal state.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            JobStatus::Pending => false,
            JobStatus::Fetching => self == JobStatus::Pending,
            JobStatus::Analyzing => self == JobStatus::Fetching,
            JobStatus::Completed => self == JobStatus::Analyzing,
            JobStatus::Failed => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_move_forward() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Fetching));
        assert!(JobStatus::Fetching.can_transition_to(JobStatus::Analyzing));
        assert!(JobStatus::Analyzing.can_transition_to(JobStatus::Completed));

        assert!(!JobStatus::Analyzing.can_transition_to(JobStatus::Fetching));
        assert!(!JobStatus::Fetching.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
    }

    #[test]
    fn failure_attaches_to_any_non_terminal_state() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Fetching.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Analyzing.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn terminal_states_are_final() {
        for next in [
            JobStatus::Pending,
            JobStatus::Fetching,
            JobStatus::Analyzing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert!(!JobStatus::Completed.can_transition_to(next));
            assert!(!JobStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Fetching,
            JobStatus::Analyzing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("cloning"), None);
    }
}
