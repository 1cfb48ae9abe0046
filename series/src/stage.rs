use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use ethflow_utils::InternalTransaction;
use tracing::debug;

use crate::{
    math::total_ether,
    timeframe::{from_unix, TimeFrameConfig, TimeFrameKey},
};

/// 2024-03-21 00:00:00 UTC.
pub const SMOOTHING_LAUNCH_SECS: i64 = 1_710_979_200;
/// 2024-03-23 00:00:00 UTC.
pub const SMOOTHING_END_SECS: i64 = 1_711_152_000;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Maps dates to block heights for a single refresh. Dates resolved upstream
/// win, everything else is estimated from the current block.
#[derive(Clone, Debug)]
pub struct BlockClock {
    pub current_block: u64,
    pub now: DateTime<Utc>,
    pub blocks_per_day: u64,
    pub resolved: HashMap<DateTime<Utc>, u64>,
}

impl BlockClock {
    pub fn new(current_block: u64, now: DateTime<Utc>, blocks_per_day: u64) -> Self {
        Self {
            current_block,
            now,
            blocks_per_day,
            resolved: HashMap::new(),
        }
    }

    pub fn block_at(&self, at: DateTime<Utc>) -> u64 {
        self.resolved
            .get(&at)
            .copied()
            .unwrap_or_else(|| self.estimate(at))
    }

    pub fn estimate(&self, at: DateTime<Utc>) -> u64 {
        let elapsed_ms = (self.now - at).num_milliseconds();
        let blocks = i128::from(elapsed_ms) * i128::from(self.blocks_per_day) / i128::from(MS_PER_DAY);
        let estimate = i128::from(self.current_block) - blocks;
        estimate.clamp(0, i128::from(u64::MAX)) as u64
    }
}

/// Pre-processing applied to the transaction list before accumulation.
pub trait TransactionStage: Send + Sync {
    /// Dates whose block heights the stage needs for `frame`.
    fn anchor_dates(&self, _frame: &TimeFrameConfig) -> Vec<DateTime<Utc>> {
        Vec::new()
    }

    fn apply(
        &self,
        frame: &TimeFrameConfig,
        txs: Vec<InternalTransaction>,
        blocks: &BlockClock,
    ) -> crate::Result<Vec<InternalTransaction>>;
}

pub struct NoSmoothing;

impl TransactionStage for NoSmoothing {
    fn apply(
        &self,
        _frame: &TimeFrameConfig,
        txs: Vec<InternalTransaction>,
        _blocks: &BlockClock,
    ) -> crate::Result<Vec<InternalTransaction>> {
        Ok(txs)
    }
}

/// Spreads the observed total over one synthetic transaction per day after
/// launch, up to `smoothing_end`, so the custom window does not open on a
/// cliff. Only touches the custom window.
#[derive(Clone, Debug)]
pub struct LaunchSmoothing {
    pub launch: DateTime<Utc>,
    pub smoothing_end: DateTime<Utc>,
}

impl Default for LaunchSmoothing {
    fn default() -> Self {
        Self {
            launch: from_unix(SMOOTHING_LAUNCH_SECS),
            smoothing_end: from_unix(SMOOTHING_END_SECS),
        }
    }
}

impl LaunchSmoothing {
    fn points(&self) -> Vec<DateTime<Utc>> {
        let span_ms = (self.smoothing_end - self.launch).num_milliseconds();
        if span_ms <= 0 {
            return Vec::new();
        }
        let n = (span_ms + MS_PER_DAY - 1) / MS_PER_DAY;
        (1..=n).map(|k| self.launch + Duration::days(k)).collect()
    }
}

impl TransactionStage for LaunchSmoothing {
    fn anchor_dates(&self, frame: &TimeFrameConfig) -> Vec<DateTime<Utc>> {
        if frame.key == TimeFrameKey::Custom {
            self.points()
        } else {
            Vec::new()
        }
    }

    fn apply(
        &self,
        frame: &TimeFrameConfig,
        txs: Vec<InternalTransaction>,
        blocks: &BlockClock,
    ) -> crate::Result<Vec<InternalTransaction>> {
        if frame.key != TimeFrameKey::Custom {
            return Ok(txs);
        }

        let points = self.points();
        let observed = total_ether(&txs);
        if points.is_empty() || observed <= 0.0 {
            return Ok(txs);
        }

        let share = observed / points.len() as f64;
        let mut out = Vec::with_capacity(points.len() + txs.len());
        for at in &points {
            out.push(InternalTransaction::synthetic(blocks.block_at(*at), share)?);
        }
        debug!(points = points.len(), share, "prepended launch smoothing");
        out.extend(txs);
        Ok(out)
    }
}
