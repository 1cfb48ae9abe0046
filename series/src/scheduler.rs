use std::{sync::Arc, time::Duration};

use ethflow_utils::ChainSource;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{CacheStore, RefreshOutcome, Refresher};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Refreshes `store` right away and then every `interval` until `shutdown`
/// fires. Ticks missed while a refresh runs long are dropped.
pub fn spawn_refresh_task<S>(
    store: Arc<CacheStore>,
    refresher: Arc<Refresher<S>>,
    interval: Duration,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()>
where
    S: ChainSource + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("refresh task stopped");
                    break;
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            info!("refresh interrupted by shutdown");
                            break;
                        }
                        outcome = store.refresh(&refresher) => {
                            if outcome == RefreshOutcome::Fresh {
                                debug!("cache still fresh, skipped refresh");
                            }
                        }
                    }
                }
            }
        }
    })
}
