use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

pub const BLOCKS_PER_DAY: u64 = 6500;
pub const CUSTOM_INTERVAL_COUNT: u32 = 30;
pub const LABEL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// 2024-03-20 00:00:00 UTC.
pub const LAUNCH_ANCHOR_SECS: i64 = 1_710_892_800;

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum TimeFrameKey {
    #[strum(serialize = "1d")]
    #[serde(rename = "1d")]
    OneDay,
    #[strum(serialize = "7d")]
    #[serde(rename = "7d")]
    SevenDays,
    #[strum(serialize = "30d")]
    #[serde(rename = "30d")]
    ThirtyDays,
    #[strum(serialize = "custom")]
    #[serde(rename = "custom")]
    Custom,
}

impl TimeFrameKey {
    pub fn parse(s: &str) -> crate::Result<Self> {
        s.parse()
            .map_err(|_| crate::Error::InvalidTimeFrame(s.to_string()))
    }
}

/// Where the first label of a window sits.
#[derive(Clone, Debug, PartialEq)]
pub enum StartAnchor {
    /// The window ends now and reaches back `total_days`.
    Now,
    /// The window spans from this date to now.
    Date(DateTime<Utc>),
}

/// Chain and launch constants the windows are derived from.
#[derive(Clone, Debug)]
pub struct FrameSettings {
    pub blocks_per_day: u64,
    pub launch_anchor: DateTime<Utc>,
    pub custom_interval_count: u32,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            blocks_per_day: BLOCKS_PER_DAY,
            launch_anchor: from_unix(LAUNCH_ANCHOR_SECS),
            custom_interval_count: CUSTOM_INTERVAL_COUNT,
        }
    }
}

pub fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimeFrameConfig {
    pub key: TimeFrameKey,
    pub total_days: u64,
    pub interval_count: u32,
    pub blocks_per_interval: u64,
    pub start_anchor: StartAnchor,
}

impl TimeFrameConfig {
    pub fn new(
        key: TimeFrameKey,
        total_days: u64,
        interval_count: u32,
        blocks_per_interval: u64,
        start_anchor: StartAnchor,
    ) -> crate::Result<Self> {
        if interval_count == 0 {
            return Err(crate::Error::InvalidTimeFrame(format!(
                "{key} needs at least one interval"
            )));
        }
        if blocks_per_interval == 0 {
            return Err(crate::Error::InvalidTimeFrame(format!(
                "{key} samples zero blocks per interval"
            )));
        }

        Ok(Self {
            key,
            total_days,
            interval_count,
            blocks_per_interval,
            start_anchor,
        })
    }

    pub fn for_key(
        key: TimeFrameKey,
        settings: &FrameSettings,
        now: DateTime<Utc>,
    ) -> crate::Result<Self> {
        let per_day = settings.blocks_per_day;
        let fraction_of_day = |parts: f64| (per_day as f64 / parts).round() as u64;

        match key {
            TimeFrameKey::OneDay => {
                Self::new(key, 1, 24, fraction_of_day(24.0), StartAnchor::Now)
            }
            TimeFrameKey::SevenDays => {
                Self::new(key, 7, 28, fraction_of_day(4.0), StartAnchor::Now)
            }
            TimeFrameKey::ThirtyDays => Self::new(key, 30, 30, per_day, StartAnchor::Now),
            TimeFrameKey::Custom => {
                let elapsed_ms = (now - settings.launch_anchor).num_milliseconds().max(0);
                let total_days = ((elapsed_ms + MS_PER_DAY - 1) / MS_PER_DAY) as u64;
                let interval_count = settings.custom_interval_count;
                let blocks_per_interval = if interval_count == 0 {
                    0
                } else {
                    per_day * total_days / u64::from(interval_count)
                };

                Self::new(
                    key,
                    total_days,
                    interval_count,
                    blocks_per_interval,
                    StartAnchor::Date(settings.launch_anchor),
                )
            }
        }
    }

    /// `interval_count + 1` block heights, oldest first, the last one being
    /// `current_block`. Heights before genesis clamp to 0.
    pub fn sample_blocks(&self, current_block: u64) -> Vec<u64> {
        (0..=u64::from(self.interval_count))
            .map(|i| {
                let back = (u64::from(self.interval_count) - i) * self.blocks_per_interval;
                current_block.saturating_sub(back)
            })
            .collect()
    }

    /// `interval_count + 1` labels aligned with [`Self::sample_blocks`].
    pub fn labels(&self, now: DateTime<Utc>) -> Vec<String> {
        let n = i64::from(self.interval_count);
        let (start, span_ms) = match &self.start_anchor {
            StartAnchor::Now => {
                let span_ms = self.total_days as i64 * MS_PER_DAY;
                (now - Duration::milliseconds(span_ms), span_ms)
            }
            StartAnchor::Date(anchor) => (*anchor, (now - *anchor).num_milliseconds()),
        };

        (0..=n)
            .map(|i| {
                let at = start + Duration::milliseconds(span_ms * i / n);
                at.format(LABEL_FORMAT).to_string()
            })
            .collect()
    }
}
