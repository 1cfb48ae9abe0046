use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Value '{0}' is not a wei amount, expected a string of decimal digits.")]
    InvalidWeiValue(String),

    #[error("Ether amount {0} cannot be expressed in wei.")]
    InvalidEtherValue(f64),

    #[error("Ether amount '{0}' failed to encode as wei. (Error: {1})")]
    WeiEncodeFailed(String, alloy::primitives::utils::UnitsError),

    #[error("Decoded ether amount '{0}' failed to parse. (Error: {1})")]
    EtherParseFailed(String, std::num::ParseFloatError),
}
