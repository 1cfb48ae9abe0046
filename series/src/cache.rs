use std::{collections::BTreeMap, sync::Arc, sync::Mutex};

use alloy::primitives::Address;
use arc_swap::ArcSwap;
use chrono::{DateTime, Duration, Utc};
use ethflow_utils::ChainSource;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumString};
use tracing::{error, info, warn};

use crate::{
    clock::Clock,
    generator::{RefreshInputs, SeriesGenerator},
    snapshot::CacheSnapshot,
    timeframe::{FrameSettings, TimeFrameConfig, TimeFrameKey},
};

pub const DEFAULT_FRESHNESS_MINUTES: i64 = 30;

/// Slack on the freshness window. A scheduler tick that wakes a little earlier
/// relative to its predecessor must still refresh.
pub const FRESHNESS_TOLERANCE_SECS: i64 = 1;

pub type SnapshotMap = BTreeMap<TimeFrameKey, Option<Arc<CacheSnapshot>>>;

/// How a refresh with some failing time frames is published.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum RefreshPolicy {
    /// Publish only when every time frame succeeded.
    #[default]
    AllOrNothing,
    /// Publish every time frame that succeeded, keep the rest as they were.
    PerKey,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RefreshOutcome {
    /// Skipped, the previous attempt is recent enough.
    Fresh,
    Refreshed,
    Partial { failed: Vec<TimeFrameKey> },
    Failed,
}

/// Pulls one round of chain data and turns it into a snapshot per key.
pub struct Refresher<S> {
    pub source: S,
    pub generator: SeriesGenerator,
    pub address: Address,
    pub contract: Address,
    pub settings: FrameSettings,
    pub policy: RefreshPolicy,
}

impl<S: ChainSource> Refresher<S> {
    pub fn new(source: S, generator: SeriesGenerator, contract: Address) -> Self {
        Self {
            source,
            address: generator.address,
            generator,
            contract,
            settings: FrameSettings::default(),
            policy: RefreshPolicy::default(),
        }
    }

    pub fn with_settings(mut self, settings: FrameSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Block height, balance and transactions are read once and shared by all
    /// keys. Under [`RefreshPolicy::AllOrNothing`] the first failing key
    /// aborts the run.
    pub async fn run(
        &self,
        keys: &[TimeFrameKey],
        now: DateTime<Utc>,
    ) -> crate::Result<Vec<(TimeFrameKey, crate::Result<CacheSnapshot>)>> {
        let current_block = self.source.current_block_height().await?;
        let current_balance = self.source.balance_at_block(self.address, None).await?;
        let transactions = self
            .source
            .internal_transactions(self.contract, self.address)
            .await;

        let inputs = RefreshInputs {
            current_block,
            current_balance,
            transactions,
            now,
            blocks_per_day: self.settings.blocks_per_day,
        };

        let mut results = Vec::with_capacity(keys.len());
        for &key in keys {
            let result = match TimeFrameConfig::for_key(key, &self.settings, now) {
                Ok(frame) => self.generator.generate(&self.source, &frame, &inputs).await,
                Err(err) => Err(err),
            };

            match result {
                Err(err) if self.policy == RefreshPolicy::AllOrNothing => return Err(err),
                result => results.push((key, result)),
            }
        }
        Ok(results)
    }
}

/// Latest snapshot per time frame. Readers load the map without locking and
/// refreshes replace it whole.
pub struct CacheStore {
    snapshots: ArcSwap<SnapshotMap>,
    last_attempt: Mutex<Option<DateTime<Utc>>>,
    last_success: Mutex<Option<DateTime<Utc>>>,
    freshness: Duration,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let empty: SnapshotMap = TimeFrameKey::iter().map(|key| (key, None)).collect();
        Self {
            snapshots: ArcSwap::from_pointee(empty),
            last_attempt: Mutex::new(None),
            last_success: Mutex::new(None),
            freshness: Duration::minutes(DEFAULT_FRESHNESS_MINUTES),
            clock,
        }
    }

    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn get(&self, key: TimeFrameKey) -> Option<Arc<CacheSnapshot>> {
        self.snapshots.load().get(&key).cloned().flatten()
    }

    /// Lookup by wire name. Unknown and not yet populated keys are both
    /// reported as an invalid time frame.
    pub fn get_str(&self, key: &str) -> crate::Result<Arc<CacheSnapshot>> {
        let parsed = TimeFrameKey::parse(key)?;
        self.get(parsed)
            .ok_or_else(|| crate::Error::InvalidTimeFrame(key.to_string()))
    }

    pub fn entries(&self) -> Arc<SnapshotMap> {
        self.snapshots.load_full()
    }

    /// Replaces the snapshot of a single key, leaving the others as they are.
    pub fn publish(&self, key: TimeFrameKey, snapshot: CacheSnapshot) {
        let snapshot = Arc::new(snapshot);
        self.snapshots.rcu(|current| {
            let mut next = SnapshotMap::clone(current);
            next.insert(key, Some(snapshot.clone()));
            next
        });
    }

    /// Time of the last refresh that published anything.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_success.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn refresh<S: ChainSource>(&self, refresher: &Refresher<S>) -> RefreshOutcome {
        let now = self.clock.now();
        {
            let mut last_attempt = self.last_attempt.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(at) = *last_attempt {
                if now - at + Duration::seconds(FRESHNESS_TOLERANCE_SECS) < self.freshness {
                    return RefreshOutcome::Fresh;
                }
            }
            *last_attempt = Some(now);
        }

        let keys: Vec<TimeFrameKey> = TimeFrameKey::iter().collect();
        let results = match refresher.run(&keys, now).await {
            Ok(results) => results,
            Err(err) => {
                error!(error = %err, "cache refresh failed, keeping previous snapshots");
                return RefreshOutcome::Failed;
            }
        };

        let mut next: SnapshotMap = (**self.snapshots.load()).clone();
        let mut failed = Vec::new();
        for (key, result) in results {
            match result {
                Ok(snapshot) => {
                    next.insert(key, Some(Arc::new(snapshot)));
                }
                Err(err) => {
                    warn!(frame = %key, error = %err, "time frame refresh failed");
                    failed.push(key);
                }
            }
        }

        if failed.len() == keys.len() {
            error!("every time frame failed, keeping previous snapshots");
            return RefreshOutcome::Failed;
        }

        self.snapshots.store(Arc::new(next));
        *self.last_success.lock().unwrap_or_else(|e| e.into_inner()) = Some(now);

        if failed.is_empty() {
            info!(frames = keys.len(), "cache refreshed");
            RefreshOutcome::Refreshed
        } else {
            info!(?failed, "cache partially refreshed");
            RefreshOutcome::Partial { failed }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        stage::LaunchSmoothing,
        testutils::{tx, utc_date, MockSource, ADDRESS, CONTRACT},
    };

    const BLOCK: u64 = 20_000_000;

    fn setup(source: MockSource) -> (Arc<ManualClock>, CacheStore, Refresher<MockSource>) {
        let clock = Arc::new(ManualClock::new(utc_date(2024, 6, 1)));
        let store = CacheStore::new(clock.clone());
        let refresher = Refresher::new(source, SeriesGenerator::new(ADDRESS), CONTRACT);
        (clock, store, refresher)
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("all-or-nothing".parse::<RefreshPolicy>().unwrap(), RefreshPolicy::AllOrNothing);
        assert_eq!("per-key".parse::<RefreshPolicy>().unwrap(), RefreshPolicy::PerKey);
        assert_eq!(RefreshPolicy::PerKey.to_string(), "per-key");
    }

    #[test]
    fn test_starts_empty() {
        let (_, store, _) = setup(MockSource::new(BLOCK));
        let entries = store.entries();

        assert_eq!(entries.len(), 4);
        assert!(entries.values().all(Option::is_none));
        assert!(store.get(TimeFrameKey::OneDay).is_none());
        assert!(store.last_refresh().is_none());
        assert!(matches!(
            store.get_str("1d"),
            Err(crate::Error::InvalidTimeFrame(_))
        ));
    }

    #[test]
    fn test_publish_single_key() {
        let (_, store, _) = setup(MockSource::new(BLOCK));
        let before = store.entries();

        store.publish(
            TimeFrameKey::SevenDays,
            CacheSnapshot {
                labels: vec!["2024-06-01 00:00:00".to_string()],
                supply_change: vec![1.0],
                cumulative_generated: vec![0.5],
                contract_balance_total: 0.5,
                current_eth_total: 2.0,
                placeholder: None,
            },
        );

        assert_eq!(store.get_str("7d").unwrap().current_eth_total, 2.0);
        assert!(store.get(TimeFrameKey::OneDay).is_none());
        // Readers holding the old map are unaffected.
        assert!(before.values().all(Option::is_none));
    }

    #[tokio::test]
    async fn test_refresh_populates_every_key() {
        let source = MockSource::new(BLOCK)
            .with_latest_balance(3.5)
            .with_transactions(vec![tx(BLOCK - 10, "1500000000000000000")]);
        let (clock, store, refresher) = setup(source);

        assert_eq!(store.refresh(&refresher).await, RefreshOutcome::Refreshed);

        for key in TimeFrameKey::iter() {
            let snap = store.get(key).unwrap();
            assert_eq!(snap.current_eth_total, 3.5);
            assert_eq!(snap.contract_balance_total, 1.5);
        }
        assert_eq!(store.get_str("30d").unwrap().labels.len(), 30);
        assert!(store.get_str("bogus").is_err());
        assert_eq!(store.last_refresh(), Some(clock.now()));
        // Shared inputs are read once per refresh.
        assert_eq!(refresher.source.block_height_calls(), 1);
        assert_eq!(refresher.source.transaction_calls(), 1);
    }

    #[tokio::test]
    async fn test_freshness_guard() {
        let (clock, store, refresher) = setup(MockSource::new(BLOCK));

        assert_eq!(store.refresh(&refresher).await, RefreshOutcome::Refreshed);
        clock.advance(Duration::minutes(10));
        assert_eq!(store.refresh(&refresher).await, RefreshOutcome::Fresh);
        assert_eq!(store.refresh(&refresher).await, RefreshOutcome::Fresh);
        assert_eq!(refresher.source.block_height_calls(), 1);

        clock.advance(Duration::minutes(20));
        assert_eq!(store.refresh(&refresher).await, RefreshOutcome::Refreshed);
        assert_eq!(refresher.source.block_height_calls(), 2);
    }

    #[tokio::test]
    async fn test_tick_slightly_early_still_refreshes() {
        let (clock, store, refresher) = setup(MockSource::new(BLOCK));

        assert_eq!(store.refresh(&refresher).await, RefreshOutcome::Refreshed);
        // Next tick woke 1 ms earlier than the previous one did.
        clock.advance(Duration::minutes(DEFAULT_FRESHNESS_MINUTES) - Duration::milliseconds(1));
        assert_eq!(store.refresh(&refresher).await, RefreshOutcome::Refreshed);
        assert_eq!(refresher.source.block_height_calls(), 2);

        clock.advance(Duration::minutes(DEFAULT_FRESHNESS_MINUTES) - Duration::seconds(5));
        assert_eq!(store.refresh(&refresher).await, RefreshOutcome::Fresh);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_run_once() {
        let (_, store, refresher) = setup(MockSource::new(BLOCK));

        let (a, b) = tokio::join!(store.refresh(&refresher), store.refresh(&refresher));

        let mut outcomes = [a, b];
        outcomes.sort_by_key(|o| matches!(o, RefreshOutcome::Fresh));
        assert_eq!(outcomes, [RefreshOutcome::Refreshed, RefreshOutcome::Fresh]);
        assert_eq!(refresher.source.block_height_calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_snapshots() {
        let (clock, store, refresher) = setup(MockSource::new(BLOCK).with_latest_balance(1.0));

        assert_eq!(store.refresh(&refresher).await, RefreshOutcome::Refreshed);
        let before = store.get(TimeFrameKey::SevenDays).unwrap();
        let refreshed_at = store.last_refresh();

        refresher.source.set_failing(true);
        clock.advance(Duration::minutes(31));
        assert_eq!(store.refresh(&refresher).await, RefreshOutcome::Failed);

        let after = store.get(TimeFrameKey::SevenDays).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(store.last_refresh(), refreshed_at);

        // The failed attempt still counts for the guard.
        refresher.source.set_failing(false);
        clock.advance(Duration::minutes(1));
        assert_eq!(store.refresh(&refresher).await, RefreshOutcome::Fresh);
    }

    #[tokio::test]
    async fn test_custom_key_failure_by_policy() {
        // Before the launch anchor the custom window is empty and fails.
        let early = utc_date(2024, 3, 1);

        let (clock, store, refresher) = setup(MockSource::new(BLOCK));
        clock.set(early);
        assert_eq!(store.refresh(&refresher).await, RefreshOutcome::Failed);
        assert!(store.entries().values().all(Option::is_none));

        let (clock, store, refresher) = setup(MockSource::new(BLOCK));
        let refresher = refresher.with_policy(RefreshPolicy::PerKey);
        clock.set(early);
        assert_eq!(
            store.refresh(&refresher).await,
            RefreshOutcome::Partial {
                failed: vec![TimeFrameKey::Custom]
            }
        );
        assert!(store.get(TimeFrameKey::OneDay).is_some());
        assert!(store.get(TimeFrameKey::Custom).is_none());
        assert!(store.get_str("custom").is_err());
    }

    #[tokio::test]
    async fn test_smoothing_estimates_use_frame_blocks_per_day() {
        let current_block = 100_000;
        let source = MockSource::new(current_block)
            .with_transactions(vec![tx(current_block, "4000000000000000000")]);
        let generator = SeriesGenerator::new(ADDRESS).with_stage(Arc::new(LaunchSmoothing::default()));
        let refresher = Refresher::new(source, generator, CONTRACT).with_settings(FrameSettings {
            blocks_per_day: 1000,
            custom_interval_count: 5,
            ..FrameSettings::default()
        });

        let results = refresher
            .run(&[TimeFrameKey::Custom], utc_date(2024, 3, 25))
            .await
            .unwrap();
        let snap = results[0].1.as_ref().unwrap();

        // Samples at 95k..=100k. Unresolved anchors 03-22 and 03-23 land at
        // 97k and 98k, 1000 blocks per day back from now.
        assert_eq!(snap.cumulative_generated, vec![0.0, 2.0, 2.0, 0.0, 4.0]);
        assert_eq!(refresher.source.block_lookups(), 2);
    }

    #[tokio::test]
    async fn test_per_key_keeps_previous_snapshot_of_failed_key() {
        let (clock, store, refresher) = setup(MockSource::new(BLOCK));
        let refresher = refresher.with_policy(RefreshPolicy::PerKey);

        assert_eq!(store.refresh(&refresher).await, RefreshOutcome::Refreshed);
        let custom = store.get(TimeFrameKey::Custom).unwrap();
        let day = store.get(TimeFrameKey::OneDay).unwrap();

        // Moving the launch anchor past now breaks only the custom window.
        let refresher = Refresher {
            settings: FrameSettings {
                launch_anchor: utc_date(2030, 1, 1),
                ..FrameSettings::default()
            },
            ..refresher
        };
        clock.advance(Duration::hours(1));
        assert_eq!(
            store.refresh(&refresher).await,
            RefreshOutcome::Partial {
                failed: vec![TimeFrameKey::Custom]
            }
        );
        assert!(Arc::ptr_eq(&custom, &store.get(TimeFrameKey::Custom).unwrap()));
        assert!(!Arc::ptr_eq(&day, &store.get(TimeFrameKey::OneDay).unwrap()));
    }
}
