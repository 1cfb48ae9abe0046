pub type Result<T> = std::result::Result<T, BinError>;

#[derive(Debug, thiserror::Error)]
pub enum BinError {
    #[error(transparent)]
    Utils(#[from] ethflow_utils::Error),

    #[error(transparent)]
    Api(#[from] ethflow_api::Error),

    #[error("No RPC endpoint configured, set ETHFLOW_RPC_URL or INFURA_API_KEY.")]
    MissingRpcUrl,

    #[error("Refresh task failed to join. (Error: {0})")]
    RefreshTaskJoinFailed(#[from] tokio::task::JoinError),
}
