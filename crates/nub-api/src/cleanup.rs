use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::state::{AppState, run_db};

/// Background task that drops sign-ups whose verification code has expired.
pub async fn run_cleanup_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        interval.tick().await;

        match run_db(&state, |state| Ok(state.db.purge_expired_registrations(Utc::now())?)).await {
            Ok(count) => {
                if count > 0 {
                    info!("Cleanup: pruned {} expired registrations", count);
                }
            }
            Err(e) => {
                warn!("Cleanup error: {}", e);
            }
        }
    }
}
