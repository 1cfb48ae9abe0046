//! Read-only HTTP API over the series cache.
//!
//! Routes:
//! * `GET /api/data?timeFrame=1d&simulate=true` - one snapshot
//! * `GET /api/cache` - every snapshot, `null` where not populated yet
//! * `GET /api/health` - liveness and time of the last refresh
pub mod error;
mod serve;

pub use error::{ApiError as Error, Result};
pub use serve::*;
