pub mod config;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod metadata;
pub mod storage;
mod wallet;

pub use config::{StorageConfig, WalletConfig};
pub use error::{Result, WalletError};
pub use wallet::Wallet;
