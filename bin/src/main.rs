use std::sync::Arc;

use clap::Parser;
use ethflow_series::{
    clock::SystemClock, generator::SeriesGenerator, placeholder::RandomCategories,
    scheduler::spawn_refresh_task, stage::LaunchSmoothing, CacheStore, Refresher,
};
use ethflow_utils::{
    alloy::StringExt, etherscan::Explorer, log::init_tracing, rpc::RpcClient, EthereumSource,
    FetchClient, RetryPolicy, TokenBucket,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::Cli;

mod cli;
mod error;
mod panic_hook;

pub use error::{BinError as Error, Result};

#[tokio::main]
async fn main() -> crate::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_file.as_deref())?;
    panic_hook::set();

    let rpc_url = cli.resolve_rpc_url()?;
    let address = cli.address.parse_as_address()?;
    let contract = cli.contract.parse_as_address()?;

    // One bucket for every upstream, RPC and explorer alike.
    let fetch = Arc::new(FetchClient::new(
        TokenBucket::new(cli.rate_limit_tokens, cli.rate_limit_window),
        RetryPolicy {
            max_attempts: cli.max_retries,
            base_delay: cli.retry_base_delay,
        },
    ));
    let source = EthereumSource::new(
        RpcClient::new(&rpc_url, fetch.clone())?,
        Explorer::new(&cli.explorer_url, &cli.etherscan_api_key, fetch),
    );

    let mut generator = SeriesGenerator::new(address).with_balance_offset(cli.balance_offset);
    if cli.launch_smoothing {
        generator = generator.with_stage(Arc::new(LaunchSmoothing::default()));
    }
    if cli.placeholder_categories {
        generator = generator.with_categories(Arc::new(RandomCategories));
    }

    let refresher =
        Arc::new(Refresher::new(source, generator, contract).with_policy(cli.refresh_policy));
    let store = Arc::new(CacheStore::new(Arc::new(SystemClock)));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("shutdown signal received");
                    shutdown.cancel();
                }
                Err(err) => warn!(error = %err, "cannot listen for ctrl-c"),
            }
        }
    });

    info!(
        %address,
        %contract,
        interval = %humantime::format_duration(cli.refresh_interval),
        policy = %cli.refresh_policy,
        "starting ethflow"
    );

    let refresh = spawn_refresh_task(
        store.clone(),
        refresher,
        cli.refresh_interval,
        shutdown.clone(),
    );
    let served = ethflow_api::serve(cli.port, store, shutdown.clone()).await;

    shutdown.cancel();
    refresh.await?;
    served?;

    info!("bye");
    Ok(())
}
