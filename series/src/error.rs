pub type Result<T> = std::result::Result<T, SeriesError>;

#[derive(Debug, thiserror::Error)]
pub enum SeriesError {
    #[error(transparent)]
    Utils(#[from] ethflow_utils::Error),

    #[error("Invalid time frame: {0}")]
    InvalidTimeFrame(String),
}
