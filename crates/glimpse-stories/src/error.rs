use thiserror::Error;

/// Errors surfaced by `StoryService`. Unknown story ids are not errors.
#[derive(Debug, Error)]
pub enum StoryError {
    /// Rejected before any store mutation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backing store or profile directory failed. Not retried here.
    #[error("collaborator unavailable: {0:#}")]
    Unavailable(anyhow::Error),
}

impl StoryError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
