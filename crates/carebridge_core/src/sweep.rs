//! Periodic staleness sweep
//!
//! Reads a snapshot of stale requests from the router, then posts one
//! reminder per request to the room of its category. Notification happens
//! after the router lock is released.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::notify::{StaffNotifier, stale_notice};
use crate::router::ConversationRouter;

/// Run one sweep; returns how many reminders were delivered
pub async fn notify_stale(
    router: &ConversationRouter,
    notifier: &dyn StaffNotifier,
    threshold: chrono::Duration,
) -> usize {
    let stale = router.sweep_stale(threshold);
    if stale.is_empty() {
        debug!("No stale requests");
        return 0;
    }
    info!(count = stale.len(), "Found stale requests");

    let mut delivered = 0;
    for record in &stale {
        let room = &router.categories().route(record.category).room;
        let text = stale_notice(record, threshold.num_minutes());
        match notifier.notify(room, &text).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!(
                user_id = %record.user.id,
                room = %room,
                error = %e,
                "Failed to send stale request reminder"
            ),
        }
    }
    delivered
}

/// Sweep every `interval` until the task is aborted. The first sweep runs
/// one full interval after start.
pub fn spawn_stale_sweep(
    router: Arc<ConversationRouter>,
    notifier: Arc<dyn StaffNotifier>,
    interval: Duration,
    threshold: chrono::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the first tick (fires immediately)
        ticker.tick().await;

        info!(
            interval_secs = interval.as_secs(),
            threshold_minutes = threshold.num_minutes(),
            "Stale request sweep started"
        );

        loop {
            ticker.tick().await;
            notify_stale(&router, notifier.as_ref(), threshold).await;
        }
    })
}
