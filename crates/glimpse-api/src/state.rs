use std::sync::Arc;

use tracing::error;

use glimpse_stories::{ProfileDirectory, StoryError, StoryService};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub service: StoryService,
    pub profiles: Arc<dyn ProfileDirectory>,
    pub jwt_secret: String,
}

impl AppStateInner {
    /// Runs a service call on the blocking pool; the stores do synchronous I/O.
    pub async fn run_blocking<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&StoryService) -> Result<T, StoryError> + Send + 'static,
        T: Send + 'static,
    {
        let service = self.service.clone();
        tokio::task::spawn_blocking(move || f(&service))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal
            })?
            .map_err(ApiError::from)
    }
}
