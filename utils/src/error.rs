use std::path::PathBuf;

use serde_json::Value;
use url::Url;

use crate::reqwest::{ReqwestErrorContext, ReqwestInnerError, ReqwestStage};

pub type Result<T> = std::result::Result<T, UtilsError>;

#[derive(Debug, thiserror::Error)]
pub enum UtilsError {
    #[error(transparent)]
    Common(#[from] ethflow_common::Error),

    #[error("Upstream responded with status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("No rate limit token became available for '{label}' after {waited_polls} polls.")]
    RateLimitExhausted { label: String, waited_polls: u32 },

    #[error("Connection to {target} failed, the upstream seems to be unreachable. (Error: {message})")]
    TransientNetwork { target: String, message: String },

    #[error("Block explorer returned an error: {message} (Result: {result})")]
    Explorer { message: String, result: String },

    #[error("RPC call to {target} failed. (Error: {message})")]
    Rpc { target: String, message: String },

    #[error("Failed to parse JSON value: {0:?}. (Error: {1:?})")]
    SerdeJsonValueParseFailed(Value, serde_json::Error),

    #[error(transparent)]
    SerdePathToError(#[from] serde_path_to_error::Error<serde_json::Error>),

    #[error("Address '{0}' is not a valid Ethereum address.")]
    InvalidAddress(String),

    #[error("Failed to parse URL: {0}. (Error: {1:?})")]
    UrlParsingFailed(String, url::ParseError),

    #[error("Request '{url}' failed at stage '{stage:?}' (Error='{inner:?}', Context='{context:?}')", url = context.url)]
    ReqwestFailed {
        stage: ReqwestStage,
        context: Box<ReqwestErrorContext>,
        inner: ReqwestInnerError,
    },

    #[error("Failed to open the log file: {0:?}. (Error: {1:?})")]
    LogFileOpenFailed(PathBuf, std::io::Error),

    #[error("Failed to install the tracing subscriber. (Error: {0})")]
    TracingInitFailed(String),
}

impl UtilsError {
    pub fn internet(url: &Url, err: &reqwest::Error) -> Self {
        Self::TransientNetwork {
            target: url.to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_connect(&self) -> bool {
        match self {
            Self::TransientNetwork { .. } => true,
            Self::ReqwestFailed { inner, .. } => inner.is_connect(),
            _ => false,
        }
    }

    /// Whether the upstream asked us to slow down or had a gateway hiccup.
    /// Only these are retried by the fetch client, everything else surfaces
    /// to the caller on the first failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Upstream { status, message } => {
                matches!(*status, 429 | 502) || is_rate_limit_message(message)
            }
            Self::Explorer { message, result } => {
                is_rate_limit_message(message) || is_rate_limit_message(result)
            }
            _ => false,
        }
    }
}

fn is_rate_limit_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains("rate limit")
}
