use thiserror::Error;

/// The closed set of failures a wallet operation can surface.
///
/// Every public entry point on [`crate::Wallet`] and [`crate::keys`] returns
/// one of these variants; nothing else escapes the crate boundary.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("item not found: {0}")]
    NotFound(String),

    #[error("storage backend failure: {0}")]
    BackendFailure(String),

    #[error("cryptographic failure: {0}")]
    CryptoFailure(String),

    #[error("encoding failure: {0}")]
    EncodingFailure(String),

    #[error("policy violation: {0}")]
    PolicyViolation(String),

    #[error("no matching recipient key found")]
    NoMatchingRecipient,
}

pub type Result<T> = std::result::Result<T, WalletError>;
