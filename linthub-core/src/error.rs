use thiserror::Error;

/// Failure taxonomy of the analysis pipeline.
///
/// `Fetch`, `EmptyInput`, `ConfigParse`, `Engine` and `Saturated` are
/// expected terminal failures: their message becomes the job's error
/// message. `Cleanup` is advisory only and never decides a job outcome.
/// Everything else is unexpected and surfaced to the job record as a
/// generic message.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("{0}")]
    Fetch(String),

    #[error("no analyzable files")]
    EmptyInput,

    #[error("analysis queue is full")]
    Saturated,

    #[error("invalid rule configuration: {0}")]
    ConfigParse(String),

    #[error("analysis engine failure: {0}")]
    Engine(String),

    #[error("cleanup failed: {0}")]
    Cleanup(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// Whether the message is fit for the job record as-is.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            AnalysisError::Fetch(_)
                | AnalysisError::EmptyInput
                | AnalysisError::Saturated
                | AnalysisError::ConfigParse(_)
                | AnalysisError::Engine(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
