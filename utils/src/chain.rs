use std::future::Future;

use alloy::primitives::Address;
use ethflow_common::units::{ether_to_wei, wei_to_ether};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{alloy::StringExt, etherscan::Explorer, etherscan::ExplorerInternalTx, rpc::RpcClient};

/// A value transfer made by contract code into the tracked address.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalTransaction {
    pub from: Address,
    pub to: Address,
    pub block_number: u64,
    /// Wei amount as a decimal digit string.
    pub value: String,
    /// Inserted by a pre-processing stage, not observed on chain.
    pub synthetic: bool,
}

impl InternalTransaction {
    pub fn ether_value(&self) -> ethflow_common::Result<f64> {
        wei_to_ether(&self.value)
    }

    pub fn synthetic(block_number: u64, ether: f64) -> crate::Result<Self> {
        Ok(Self {
            from: Address::ZERO,
            to: Address::ZERO,
            block_number,
            value: ether_to_wei(ether)?,
            synthetic: true,
        })
    }
}

/// Keeps the rows sent by `contract`. Addresses compare case-insensitively.
pub fn filter_from_contract(
    rows: Vec<ExplorerInternalTx>,
    contract: Address,
) -> Vec<InternalTransaction> {
    let mut skipped = 0;
    let txs: Vec<InternalTransaction> = rows
        .into_iter()
        .filter_map(|row| {
            let from = row.from.parse_as_address().ok()?;
            if from != contract {
                return None;
            }
            // Reverted calls moved no value.
            if row.is_error() {
                skipped += 1;
                return None;
            }
            let Ok(to) = row.to.parse_as_address() else {
                skipped += 1;
                return None;
            };
            Some(InternalTransaction {
                from,
                to,
                block_number: row.block_number,
                value: row.value,
                synthetic: false,
            })
        })
        .collect();

    if skipped > 0 {
        debug!(skipped, kept = txs.len(), "dropped unusable internal transactions");
    }
    txs
}

/// Upstream chain data needed by the series generator.
pub trait ChainSource: Send + Sync {
    fn current_block_height(&self) -> impl Future<Output = crate::Result<u64>> + Send;

    /// Balance in ether. `None` reads the latest block.
    fn balance_at_block(
        &self,
        address: Address,
        block: Option<u64>,
    ) -> impl Future<Output = crate::Result<f64>> + Send;

    /// Internal transactions into `address` originating from `contract`.
    /// Upstream failures yield an empty list.
    fn internal_transactions(
        &self,
        contract: Address,
        address: Address,
    ) -> impl Future<Output = Vec<InternalTransaction>> + Send;

    /// Last block at or before a unix timestamp.
    fn block_at_time(&self, timestamp: i64) -> impl Future<Output = crate::Result<u64>> + Send;
}

/// Mainnet data from a JSON-RPC provider plus an Etherscan compatible explorer.
pub struct EthereumSource {
    rpc: RpcClient,
    explorer: Explorer,
}

impl EthereumSource {
    pub fn new(rpc: RpcClient, explorer: Explorer) -> Self {
        Self { rpc, explorer }
    }
}

impl ChainSource for EthereumSource {
    async fn current_block_height(&self) -> crate::Result<u64> {
        self.rpc.block_number().await
    }

    async fn balance_at_block(&self, address: Address, block: Option<u64>) -> crate::Result<f64> {
        self.rpc.balance(address, block).await
    }

    async fn internal_transactions(
        &self,
        contract: Address,
        address: Address,
    ) -> Vec<InternalTransaction> {
        match self
            .explorer
            .internal_transactions(&address.to_string())
            .await
        {
            Ok(rows) => filter_from_contract(rows, contract),
            Err(err) => {
                warn!(%address, error = %err, "failed to fetch internal transactions");
                Vec::new()
            }
        }
    }

    async fn block_at_time(&self, timestamp: i64) -> crate::Result<u64> {
        self.explorer.block_by_time(timestamp).await
    }
}
