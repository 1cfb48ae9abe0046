//! Time-series derived from on-chain balances and internal transactions, and
//! the cache that serves them.
//!
//! A [`cache::Refresher`] pulls chain data through an
//! [`ethflow_utils::ChainSource`], the [`generator::SeriesGenerator`] turns it
//! into one [`snapshot::CacheSnapshot`] per [`timeframe::TimeFrameKey`], and
//! the [`cache::CacheStore`] publishes them for readers.
pub mod cache;
pub mod clock;
pub mod error;
pub mod generator;
pub mod math;
pub mod placeholder;
pub mod scheduler;
pub mod snapshot;
pub mod stage;
pub mod timeframe;

#[cfg(test)]
mod testutils;

pub use error::{Result, SeriesError as Error};

pub use cache::{CacheStore, RefreshOutcome, RefreshPolicy, Refresher};
pub use snapshot::CacheSnapshot;
pub use timeframe::TimeFrameKey;
