use std::sync::Arc;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use ethflow_common::units::round_to;
use ethflow_utils::{ChainSource, InternalTransaction};
use tracing::{debug, warn};

use crate::{
    math::{cumulative_at_thresholds, deltas, total_ether},
    placeholder::CategorySource,
    snapshot::CacheSnapshot,
    stage::{BlockClock, NoSmoothing, TransactionStage},
    timeframe::TimeFrameConfig,
};

const TOTAL_DECIMALS: i32 = 4;

/// Chain state shared by every time frame of one refresh.
#[derive(Clone, Debug)]
pub struct RefreshInputs {
    pub current_block: u64,
    pub current_balance: f64,
    pub transactions: Vec<InternalTransaction>,
    pub now: DateTime<Utc>,
    /// Same rate the frames' sample blocks were derived from.
    pub blocks_per_day: u64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BalanceSample {
    pub block_height: u64,
    pub eth_value: f64,
}

pub struct SeriesGenerator {
    pub address: Address,
    pub stage: Arc<dyn TransactionStage>,
    pub categories: Option<Arc<dyn CategorySource>>,
    pub balance_offset: f64,
}

impl SeriesGenerator {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            stage: Arc::new(NoSmoothing),
            categories: None,
            balance_offset: 0.0,
        }
    }

    pub fn with_stage(mut self, stage: Arc<dyn TransactionStage>) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_categories(mut self, categories: Arc<dyn CategorySource>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn with_balance_offset(mut self, balance_offset: f64) -> Self {
        self.balance_offset = balance_offset;
        self
    }

    pub async fn generate<S: ChainSource>(
        &self,
        source: &S,
        frame: &TimeFrameConfig,
        inputs: &RefreshInputs,
    ) -> crate::Result<CacheSnapshot> {
        let blocks = frame.sample_blocks(inputs.current_block);
        let samples = self.balance_samples(source, &blocks).await;
        let balances: Vec<f64> = samples.iter().map(|s| s.eth_value).collect();

        let clock = self.block_clock(source, frame, inputs).await;
        let processed = self
            .stage
            .apply(frame, inputs.transactions.clone(), &clock)?;
        let cumulative = cumulative_at_thresholds(&processed, &blocks);

        let mut labels = frame.labels(inputs.now);
        if !labels.is_empty() {
            labels.remove(0);
        }

        let observed: Vec<InternalTransaction> =
            processed.into_iter().filter(|tx| !tx.synthetic).collect();

        let placeholder = self
            .categories
            .as_ref()
            .map(|source| source.categories(labels.len()));

        debug!(
            frame = %frame.key,
            samples = samples.len(),
            transactions = observed.len(),
            "generated series"
        );

        Ok(CacheSnapshot {
            supply_change: deltas(&balances),
            cumulative_generated: deltas(&cumulative),
            labels,
            contract_balance_total: round_to(total_ether(&observed), TOTAL_DECIMALS),
            current_eth_total: round_to(
                inputs.current_balance + self.balance_offset,
                TOTAL_DECIMALS,
            ),
            placeholder,
        })
    }

    /// One balance per block, fetched one at a time. A failed sample reads as
    /// zero so the rest of the series survives.
    async fn balance_samples<S: ChainSource>(
        &self,
        source: &S,
        blocks: &[u64],
    ) -> Vec<BalanceSample> {
        let mut samples = Vec::with_capacity(blocks.len());
        for &block_height in blocks {
            let eth_value = match source
                .balance_at_block(self.address, Some(block_height))
                .await
            {
                Ok(value) => value,
                Err(err) => {
                    warn!(block = block_height, error = %err, "balance sample failed, using 0");
                    0.0
                }
            };
            samples.push(BalanceSample {
                block_height,
                eth_value,
            });
        }
        samples
    }

    async fn block_clock<S: ChainSource>(
        &self,
        source: &S,
        frame: &TimeFrameConfig,
        inputs: &RefreshInputs,
    ) -> BlockClock {
        let mut clock = BlockClock::new(inputs.current_block, inputs.now, inputs.blocks_per_day);
        for at in self.stage.anchor_dates(frame) {
            match source.block_at_time(at.timestamp()).await {
                Ok(block) => {
                    clock.resolved.insert(at, block);
                }
                Err(err) => {
                    debug!(%at, error = %err, "block lookup failed, estimating");
                }
            }
        }
        clock
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        placeholder::RandomCategories,
        stage::LaunchSmoothing,
        testutils::{tx, utc_date, MockSource, ADDRESS},
        timeframe::{FrameSettings, StartAnchor, TimeFrameKey, BLOCKS_PER_DAY},
    };

    fn inputs(transactions: Vec<InternalTransaction>) -> RefreshInputs {
        RefreshInputs {
            current_block: 1000,
            current_balance: 20.0,
            transactions,
            now: utc_date(2024, 6, 1),
            blocks_per_day: BLOCKS_PER_DAY,
        }
    }

    fn small_frame() -> TimeFrameConfig {
        TimeFrameConfig::new(TimeFrameKey::OneDay, 1, 3, 10, StartAnchor::Now).unwrap()
    }

    #[tokio::test]
    async fn test_supply_change_from_balances() {
        let source = MockSource::new(1000)
            .with_balance(970, 10.0)
            .with_balance(980, 12.0)
            .with_balance(990, 15.0)
            .with_balance(1000, 20.0);
        let generator = SeriesGenerator::new(ADDRESS);

        let snap = generator
            .generate(&source, &small_frame(), &inputs(Vec::new()))
            .await
            .unwrap();

        assert_eq!(snap.supply_change, vec![2.0, 3.0, 5.0]);
        assert_eq!(snap.cumulative_generated, vec![0.0, 0.0, 0.0]);
        assert_eq!(
            snap.labels,
            vec!["2024-05-31 08:00:00", "2024-05-31 16:00:00", "2024-06-01 00:00:00"]
        );
        assert_eq!(snap.current_eth_total, 20.0);
        assert_eq!(source.balance_calls(), 4);
        assert!(snap.placeholder.is_none());
    }

    #[tokio::test]
    async fn test_cumulative_generated_from_transactions() {
        let source = MockSource::new(1000);
        let generator = SeriesGenerator::new(ADDRESS);
        let txs = vec![
            tx(500, "4000000000000000000"),
            tx(975, "1000000000000000000"),
            tx(990, "2000000000000000000"),
        ];

        let snap = generator
            .generate(&source, &small_frame(), &inputs(txs))
            .await
            .unwrap();

        // Thresholds 970, 980, 990, 1000 see 4, 5, 7, 7.
        assert_eq!(snap.cumulative_generated, vec![1.0, 2.0, 0.0]);
        assert_eq!(snap.contract_balance_total, 7.0);
    }

    #[tokio::test]
    async fn test_failed_samples_read_as_zero() {
        let source = MockSource::new(1000)
            .with_balance(970, 10.0)
            .with_balance(990, 15.0)
            .with_balance(1000, 20.0)
            .failing_block(980);
        let generator = SeriesGenerator::new(ADDRESS);

        let snap = generator
            .generate(&source, &small_frame(), &inputs(Vec::new()))
            .await
            .unwrap();

        assert_eq!(snap.supply_change, vec![-10.0, 15.0, 5.0]);
        assert_eq!(snap.labels.len(), 3);
    }

    #[tokio::test]
    async fn test_lengths_match_interval_count() {
        let source = MockSource::new(20_000_000);
        let generator = SeriesGenerator::new(ADDRESS);
        let now = utc_date(2024, 6, 1);
        let mut inputs = inputs(Vec::new());
        inputs.current_block = 20_000_000;

        let frame =
            TimeFrameConfig::for_key(TimeFrameKey::OneDay, &FrameSettings::default(), now)
                .unwrap();
        let snap = generator.generate(&source, &frame, &inputs).await.unwrap();

        assert_eq!(snap.labels.len(), 24);
        assert_eq!(snap.supply_change.len(), 24);
        assert_eq!(snap.cumulative_generated.len(), 24);
    }

    #[tokio::test]
    async fn test_totals_are_rounded_and_offset() {
        let source = MockSource::new(1000);
        let generator = SeriesGenerator::new(ADDRESS).with_balance_offset(1.23456);
        let mut inputs = inputs(vec![tx(10, "123456789000000000")]);
        inputs.current_balance = 2.0;

        let snap = generator
            .generate(&source, &small_frame(), &inputs)
            .await
            .unwrap();

        assert_eq!(snap.current_eth_total, 3.2346);
        assert_eq!(snap.contract_balance_total, 0.1235);
    }

    #[tokio::test]
    async fn test_smoothing_on_custom_window() {
        let now = utc_date(2024, 3, 25);
        let settings = FrameSettings {
            custom_interval_count: 5,
            ..FrameSettings::default()
        };
        let frame = TimeFrameConfig::for_key(TimeFrameKey::Custom, &settings, now).unwrap();
        // 5 days from the anchor, 6500 blocks per interval.
        assert_eq!(frame.blocks_per_interval, 6500);

        let current_block = 100_000;
        let source = MockSource::new(current_block)
            .with_block_at(utc_date(2024, 3, 22), current_block - 3 * 6500);
        let generator = SeriesGenerator::new(ADDRESS).with_stage(Arc::new(LaunchSmoothing::default()));
        let inputs = RefreshInputs {
            current_block,
            current_balance: 0.0,
            transactions: vec![tx(current_block, "4000000000000000000")],
            now,
            blocks_per_day: settings.blocks_per_day,
        };

        let snap = generator.generate(&source, &frame, &inputs).await.unwrap();

        // Samples at 67.5k, 74k, 80.5k, 87k, 93.5k, 100k. Smoothing adds 2 ether
        // on 03-22 (resolved, 80.5k) and on 03-23 (estimated, 87k).
        assert_eq!(snap.cumulative_generated, vec![0.0, 2.0, 2.0, 0.0, 4.0]);
        assert_eq!(snap.contract_balance_total, 4.0);
        assert_eq!(source.block_lookups(), 2);
        assert_eq!(snap.labels.first().map(String::as_str), Some("2024-03-21 00:00:00"));
        assert_eq!(snap.labels.last().map(String::as_str), Some("2024-03-25 00:00:00"));
        assert_eq!(now - utc_date(2024, 3, 20), Duration::days(5));
    }

    #[tokio::test]
    async fn test_placeholder_categories_when_enabled() {
        let source = MockSource::new(1000);
        let generator = SeriesGenerator::new(ADDRESS).with_categories(Arc::new(RandomCategories));

        let snap = generator
            .generate(&source, &small_frame(), &inputs(Vec::new()))
            .await
            .unwrap();

        let placeholder = snap.placeholder.unwrap();
        assert_eq!(placeholder.djt.len(), 3);
        assert_eq!(placeholder.other.len(), 3);
    }
}
