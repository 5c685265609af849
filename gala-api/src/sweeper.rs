use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

use gala_workflow::RequestLifecycle;

/// Periodic idempotent sweep expiring stale requests. Runs until the
/// process exits; every tick is safe to overlap with user-initiated
/// transitions.
pub async fn run_expiry_sweeper(requests: Arc<RequestLifecycle>, every_seconds: u64) {
    let mut ticker = interval(Duration::from_secs(every_seconds));
    info!(every_seconds, "expiry sweeper started");
    loop {
        ticker.tick().await;
        match requests.expire_stale_requests(Utc::now()).await {
            Ok(0) => {}
            Ok(count) => info!(count, "sweep expired stale requests"),
            Err(err) => error!("expiry sweep failed: {err}"),
        }
    }
}
