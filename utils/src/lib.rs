pub mod alloy;
pub mod chain;
pub mod error;
pub mod etherscan;
pub mod fetch;
pub mod log;
pub mod reqwest;
pub mod rpc;
pub mod serde;
pub mod token_bucket;

pub use error::{Result, UtilsError as Error};

pub use chain::{ChainSource, EthereumSource, InternalTransaction};
pub use fetch::{FetchClient, RetryPolicy};
pub use reqwest::Reqwest;
pub use token_bucket::TokenBucket;
