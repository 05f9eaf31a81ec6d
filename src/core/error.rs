//! Pipeline failure taxonomy.

use std::time::Duration;

use thiserror::Error;

/// Reasons a pipeline run ends without completing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Caller supplied an unusable insight or config
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The text-generation call itself failed
    #[error("text generation failed: {0}")]
    TextGeneration(String),

    /// The text-generation output lacks the article fields
    #[error("could not parse generated article: {0}")]
    ArticleParse(String),

    /// A capability call exceeded its timeout
    #[error("{stage} timed out after {timeout:?}")]
    Timeout {
        stage: &'static str,
        timeout: Duration,
    },

    /// The observer cancelled the run
    #[error("pipeline run was cancelled")]
    Cancelled,
}
