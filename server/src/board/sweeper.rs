//! Background TTL sweep.
//!
//! Every cycle walks the index, evicts boards whose `If-Unmodified-Since`
//! predates `now - TTL_DAYS`, and refreshes the remaining days on the rest.
//! Each key is handled under its lock, so a sweep never races an upload that
//! is refreshing the same board. A failure on one key is logged and skipped.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::board::store;
use crate::board::{days_to_live, ttl_horizon};
use crate::state::AppState;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: usize,
    pub retained: usize,
    pub failed: usize,
}

/// Spawn the sweeper. The first cycle runs immediately, then every `interval`.
pub fn spawn_ttl_sweeper(state: AppState, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;

            let report = sweep_once(&state, Utc::now()).await;
            if report.evicted > 0 || report.failed > 0 {
                tracing::info!(
                    "TTL sweep: evicted {}, retained {}, failed {}",
                    report.evicted,
                    report.retained,
                    report.failed
                );
            } else {
                tracing::debug!("TTL sweep: {} boards retained", report.retained);
            }
        }
    })
}

/// Run one sweep cycle as of `now`.
pub async fn sweep_once(state: &AppState, now: DateTime<Utc>) -> SweepReport {
    let horizon = ttl_horizon(now);
    let mut report = SweepReport::default();

    for key in state.index.keys() {
        let guard = state.index.lock_key(&key).await;

        // Re-read under the lock: the board may have been refreshed or removed.
        let Some(board) = state.index.get(&key) else {
            continue;
        };

        match board.if_unmodified_since() {
            Some(stamp) if stamp >= horizon => {
                state.index.set_days_ttl(&key, days_to_live(stamp, now));
                report.retained += 1;
            }
            stamp => {
                let board_store = state.store.clone();
                let index = state.index.clone();
                let key_for_store = key.clone();
                match store::run_blocking(state.io_timeout, move || {
                    let _guard = guard;
                    board_store.delete_board(&key_for_store)?;
                    index.remove(&key_for_store);
                    Ok(())
                })
                .await
                {
                    Ok(()) => {
                        report.evicted += 1;
                        match stamp {
                            Some(stamp) => tracing::debug!("Evicted board {} (last update {})", key, stamp),
                            None => tracing::warn!("Evicted board {} with no usable timestamp", key),
                        }
                    }
                    Err(e) => {
                        tracing::error!("Failed to evict board {}: {}", key, e);
                        report.failed += 1;
                    }
                }
            }
        }
    }

    report
}
