use thiserror::Error;

/// Envelope/identity-adapter failures. Wraps `sigil_wallet::WalletError` for
/// failures that originate one layer down (key lookup, seal/open) and adds
/// the envelope-specific `NoMatchingRecipient` case.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("no recipient slot matches a locally known key")]
    NoMatchingRecipient,

    #[error("encoding failure: {0}")]
    EncodingFailure(String),

    #[error("policy violation: {0}")]
    PolicyViolation(String),

    #[error(transparent)]
    Wallet(#[from] sigil_wallet::WalletError),
}

pub type Result<T> = std::result::Result<T, EnvelopeError>;
