//! Background task that advances deliveries.

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::DeliveryService;

/// Runs [`DeliveryService::scan`] every `scan_interval` until aborted.
///
/// Passes never overlap: a slow pass delays the next tick rather than
/// running alongside it.
pub fn spawn_scanner(service: DeliveryService) -> JoinHandle<()> {
    let every = service.config().scan_interval;
    tokio::spawn(async move {
        info!(interval_ms = every.as_millis() as u64, "delivery scanner started");
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let moved = service.scan(Utc::now()).await;
            debug!(moved = moved.len(), "delivery scan complete");
        }
    })
}
