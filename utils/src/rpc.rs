use std::sync::Arc;

use alloy::{
    eips::BlockId,
    primitives::Address,
    providers::{DynProvider, Provider},
    transports::{RpcError, TransportError, TransportErrorKind},
};
use ethflow_common::{text_truncate::log_snippet, units::wei_to_ether};

use crate::{alloy::StringExt, fetch::FetchClient};

/// JSON-RPC provider access (`eth_blockNumber`, `eth_getBalance`), throttled
/// through the shared fetch client.
pub struct RpcClient {
    provider: DynProvider,
    target: String,
    fetch: Arc<FetchClient>,
}

impl RpcClient {
    pub fn new(rpc_url: &str, fetch: Arc<FetchClient>) -> crate::Result<Self> {
        Ok(Self {
            provider: rpc_url.to_alloy_provider()?,
            target: redact_url(rpc_url),
            fetch,
        })
    }

    pub async fn block_number(&self) -> crate::Result<u64> {
        self.fetch
            .acquire_and_call("eth_blockNumber", || async move {
                self.provider
                    .get_block_number()
                    .await
                    .map_err(|e| map_transport_error(&self.target, e))
            })
            .await
    }

    /// Balance in ether at `block`, or at the latest block for `None`.
    pub async fn balance(&self, address: Address, block: Option<u64>) -> crate::Result<f64> {
        let block_id = block.map(BlockId::number).unwrap_or_else(BlockId::latest);

        let wei = self
            .fetch
            .acquire_and_call("eth_getBalance", || async move {
                self.provider
                    .get_balance(address)
                    .block_id(block_id)
                    .await
                    .map_err(|e| map_transport_error(&self.target, e))
            })
            .await?;

        Ok(wei_to_ether(&wei.to_string())?)
    }
}

const LIMIT_EXCEEDED_CODE: i64 = -32005;

/// Sorts alloy transport failures into the upstream error taxonomy.
pub fn map_transport_error(target: &str, err: TransportError) -> crate::Error {
    match err {
        RpcError::Transport(TransportErrorKind::HttpError(http)) => crate::Error::Upstream {
            status: http.status,
            message: log_snippet(&http.body, 200),
        },
        // JSON-RPC level errors arrive over a 200 response. -32005 is the
        // "limit exceeded" code, treated like an HTTP 429.
        RpcError::ErrorResp(payload) => crate::Error::Upstream {
            status: if payload.code == LIMIT_EXCEEDED_CODE { 429 } else { 200 },
            message: format!("{} (code {})", payload.message, payload.code),
        },
        RpcError::Transport(kind) => crate::Error::TransientNetwork {
            target: target.to_string(),
            message: kind.to_string(),
        },
        other => crate::Error::Rpc {
            target: target.to_string(),
            message: other.to_string(),
        },
    }
}

/// Provider URLs usually embed the api key as the last path segment.
fn redact_url(url: &str) -> String {
    match url.rsplit_once('/') {
        Some((base, key)) if key.len() >= 16 => format!("{base}/***"),
        _ => url.to_string(),
    }
}
