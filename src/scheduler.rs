//! Fixed-interval driver for the sync engine.
//!
//! A tokio interval replaces a bare sleep loop so ticks missed while a
//! pass overruns are coalesced rather than bursted. Shutdown arrives over
//! a watch channel and is only observed between passes, so an in-flight
//! write sequence is never interrupted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::sync::SyncEngine;

/// Drive `sync_recent(1)` every `interval` until `shutdown` flips to true.
///
/// The first tick fires immediately, so the service backfills today's
/// check-ins right after startup instead of waiting a full interval.
pub async fn run_sync_scheduler(
    engine: Arc<SyncEngine>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    if !engine.is_enabled() {
        log::warn!("Sync scheduler idle: Slack credentials are not configured");
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match engine.sync_recent(1).await {
                    Ok(outcomes) => {
                        if let Some(outcome) = outcomes.first() {
                            if outcome.synced {
                                log::debug!(
                                    "Scheduled sync for {} done ({} check-ins)",
                                    outcome.date,
                                    outcome.checkins_recorded
                                );
                            }
                        }
                    }
                    Err(e) if e.is_transient() => {
                        log::warn!("Scheduled sync failed, will retry next tick: {e}");
                    }
                    Err(e) => {
                        log::error!("Scheduled sync failed: {e}");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    log::info!("Sync scheduler stopping");
                    break;
                }
            }
        }
    }
}
