use std::time::Duration;

use tracing::{info, warn};

use glimpse_stories::StoryService;

/// Background task that deletes stories past the visibility window.
///
/// Visibility never depends on this loop; it only reclaims storage.
pub async fn run_sweep_loop(service: StoryService, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let svc = service.clone();
        match tokio::task::spawn_blocking(move || svc.purge_expired()).await {
            Ok(Ok(count)) => {
                if count > 0 {
                    info!("Sweep: purged {} expired stories", count);
                }
            }
            Ok(Err(e)) => warn!("Sweep error: {}", e),
            Err(e) => warn!("Sweep task failed: {}", e),
        }
    }
}
