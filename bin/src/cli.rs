use std::{path::PathBuf, time::Duration};

use clap::Parser;
use ethflow_series::RefreshPolicy;
use ethflow_utils::etherscan::DEFAULT_EXPLORER_URL;

pub const DEFAULT_ADDRESS: &str = "0x94845333028B1204Fbe14E1278Fd4Adde46B22ce";
pub const DEFAULT_CONTRACT: &str = "0xE68F1cb52659f256Fee05Fd088D588908A6e85A1";
const INFURA_MAINNET_URL: &str = "https://mainnet.infura.io/v3";

#[derive(Parser, Debug)]
#[command(name = "ethflow", bin_name = "ethflow", version)]
#[command(about = "Caches balance and internal transaction series of an Ethereum address and serves them over HTTP")]
pub struct Cli {
    /// JSON-RPC endpoint. Takes precedence over --infura-api-key.
    #[arg(long, env = "ETHFLOW_RPC_URL")]
    pub rpc_url: Option<String>,

    #[arg(long, env = "INFURA_API_KEY", hide_env_values = true)]
    pub infura_api_key: Option<String>,

    #[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true)]
    pub etherscan_api_key: String,

    #[arg(long, env = "ETHFLOW_EXPLORER_URL", default_value = DEFAULT_EXPLORER_URL)]
    pub explorer_url: String,

    /// Address whose balance is charted.
    #[arg(long, env = "ETHFLOW_ADDRESS", default_value = DEFAULT_ADDRESS)]
    pub address: String,

    /// Contract whose internal transactions into the address are summed.
    #[arg(long, env = "ETHFLOW_CONTRACT", default_value = DEFAULT_CONTRACT)]
    pub contract: String,

    /// Ether added to the reported current balance.
    #[arg(long, env = "ETHFLOW_BALANCE_OFFSET", default_value_t = 0.0)]
    pub balance_offset: f64,

    #[arg(long, env = "ETHFLOW_REFRESH_INTERVAL", default_value = "30m", value_parser = humantime::parse_duration)]
    pub refresh_interval: Duration,

    /// Upstream calls allowed per rate limit window.
    #[arg(long, env = "ETHFLOW_RATE_LIMIT_TOKENS", default_value_t = 5)]
    pub rate_limit_tokens: usize,

    #[arg(long, env = "ETHFLOW_RATE_LIMIT_WINDOW", default_value = "1s", value_parser = humantime::parse_duration)]
    pub rate_limit_window: Duration,

    /// Attempts per upstream call, the first one included.
    #[arg(long, env = "ETHFLOW_MAX_RETRIES", default_value_t = 5)]
    pub max_retries: u32,

    #[arg(long, env = "ETHFLOW_RETRY_BASE_DELAY", default_value = "500ms", value_parser = humantime::parse_duration)]
    pub retry_base_delay: Duration,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// `all-or-nothing` or `per-key`.
    #[arg(long, env = "ETHFLOW_REFRESH_POLICY", default_value = "all-or-nothing")]
    pub refresh_policy: RefreshPolicy,

    /// Smooth the custom window over the launch days.
    #[arg(long, env = "ETHFLOW_LAUNCH_SMOOTHING", default_value_t = true, action = clap::ArgAction::Set)]
    pub launch_smoothing: bool,

    /// Attach random placeholder category series to every snapshot.
    #[arg(long, env = "ETHFLOW_PLACEHOLDER_CATEGORIES")]
    pub placeholder_categories: bool,

    #[arg(long, env = "ETHFLOW_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Append logs to this file instead of stderr.
    #[arg(long, env = "ETHFLOW_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn resolve_rpc_url(&self) -> crate::Result<String> {
        match (&self.rpc_url, &self.infura_api_key) {
            (Some(url), _) => Ok(url.clone()),
            (None, Some(key)) => Ok(format!("{INFURA_MAINNET_URL}/{key}")),
            (None, None) => Err(crate::Error::MissingRpcUrl),
        }
    }
}
