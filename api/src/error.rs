pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Failed to bind to port {0}. (Error: {1})")]
    PortBindingFailed(u16, std::io::Error),

    #[error("Server crashed. (Error: {0})")]
    ServerCrashed(std::io::Error),
}
