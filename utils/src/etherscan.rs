use std::sync::Arc;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    fetch::FetchClient,
    serde::{u64_from_str, SerdeResponseParse},
    Reqwest,
};

pub const DEFAULT_EXPLORER_URL: &str = "https://api.etherscan.io/v2/api";
pub const MAINNET_CHAIN_ID: u64 = 1;

/// Most rows the explorer returns for one list query.
pub const MAX_PAGE_SIZE: usize = 10_000;

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

/// One row of `module=account&action=txlistinternal`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ExplorerInternalTx {
    #[serde(deserialize_with = "u64_from_str")]
    pub block_number: u64,
    pub time_stamp: String,
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub is_error: String,
}

impl ExplorerInternalTx {
    pub fn is_error(&self) -> bool {
        self.is_error == "1"
    }
}

/// Etherscan compatible block explorer API.
pub struct Explorer {
    client: Client,
    base_url: String,
    api_key: String,
    chain_id: u64,
    page_size: usize,
    fetch: Arc<FetchClient>,
}

impl Explorer {
    pub fn new(base_url: impl ToString, api_key: impl ToString, fetch: Arc<FetchClient>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            chain_id: MAINNET_CHAIN_ID,
            page_size: MAX_PAGE_SIZE,
            fetch,
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Full internal transaction history received by `address`, oldest first.
    ///
    /// The explorer caps a list query at [`MAX_PAGE_SIZE`] rows whatever the
    /// page number, so a full page is followed by a query starting at its
    /// last block. That block may have been cut short, its rows are taken from
    /// the next query instead.
    pub async fn internal_transactions(
        &self,
        address: &str,
    ) -> crate::Result<Vec<ExplorerInternalTx>> {
        let mut rows = Vec::new();
        let mut start_block = 0;
        loop {
            let mut page = self.internal_transactions_from(address, start_block).await?;
            let (Some(first), Some(last)) = (page.first(), page.last()) else {
                break;
            };
            if page.len() < self.page_size {
                rows.append(&mut page);
                break;
            }

            let last_block = last.block_number;
            if first.block_number == last_block {
                warn!(
                    address,
                    block = last_block,
                    "a single block fills a whole page, later rows are not fetched"
                );
                rows.append(&mut page);
                break;
            }
            page.retain(|row| row.block_number != last_block);
            rows.append(&mut page);
            start_block = last_block;
        }
        debug!(address, count = rows.len(), "fetched internal transactions");
        Ok(rows)
    }

    async fn internal_transactions_from(
        &self,
        address: &str,
        start_block: u64,
    ) -> crate::Result<Vec<ExplorerInternalTx>> {
        let start_block = start_block.to_string();
        let page_size = self.page_size.to_string();
        self.call(
            "txlistinternal",
            &[
                ("module", "account"),
                ("action", "txlistinternal"),
                ("address", address),
                ("startblock", start_block.as_str()),
                ("endblock", "99999999"),
                ("page", "1"),
                ("offset", page_size.as_str()),
                ("sort", "asc"),
            ],
        )
        .await
    }

    /// Last block mined at or before `timestamp` (unix seconds).
    pub async fn block_by_time(&self, timestamp: i64) -> crate::Result<u64> {
        let timestamp = timestamp.to_string();
        let block: String = self
            .call(
                "getblocknobytime",
                &[
                    ("module", "block"),
                    ("action", "getblocknobytime"),
                    ("timestamp", timestamp.as_str()),
                    ("closest", "before"),
                ],
            )
            .await?;

        block.trim().parse::<u64>().map_err(|_| crate::Error::Explorer {
            message: "unexpected block number".to_string(),
            result: block,
        })
    }

    async fn call<T>(&self, label: &str, params: &[(&str, &str)]) -> crate::Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let chain_id = self.chain_id.to_string();
        let mut params: Vec<(&str, &str)> = params.to_vec();
        params.push(("chainid", chain_id.as_str()));
        params.push(("apikey", self.api_key.as_str()));
        let query = &params;

        self.fetch
            .acquire_and_call(label, || async move {
                let response = Reqwest::get(&self.client, &self.base_url)?
                    .query(query)
                    .receive_json::<ExplorerResponse>()
                    .await?;
                decode_response(response)
            })
            .await
    }
}

fn decode_response<T>(response: ExplorerResponse) -> crate::Result<T>
where
    T: DeserializeOwned + Default,
{
    if response.status == "1" {
        return (&response.result).serde_parse_custom();
    }

    // An address without history is reported as a failure.
    if response.message.starts_with("No transactions found")
        || response.message.starts_with("No records found")
    {
        return Ok(T::default());
    }

    let result = match response.result {
        Value::String(s) => s,
        other => other.to_string(),
    };
    Err(crate::Error::Explorer {
        message: response.message,
        result,
    })
}
