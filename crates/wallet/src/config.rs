use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::crypto::DEFAULT_MASTER_SALT;

/// Which `StorageBackend` a wallet should open against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageConfig {
    /// An in-process, non-persistent backend (tests, demos).
    Memory,
    /// A CouchDB-shaped REST document store reached over HTTP.
    Http { base_url: String },
}

/// Configuration needed to open a [`crate::Wallet`].
///
/// A `Default` impl resolves sensible on-disk locations via `dirs`, plus
/// whatever fields the wallet itself needs to open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Passphrase the master key is derived from. Never logged, never
    /// serialized back out once read — kept here only long enough to open.
    #[serde(skip_serializing)]
    pub passphrase: String,

    /// Which storage backend to open against.
    pub storage: StorageConfig,

    /// Per-wallet random salt for master-key derivation. `None` falls back
    /// to the fixed default salt (a known weakness, kept for compatibility
    /// with wallets created before this option existed).
    pub master_salt: Option<Vec<u8>>,

    /// Path a random `master_salt`, once generated, is persisted to
    /// alongside the wallet's metadata item. Only consulted when
    /// `master_salt` is `Some`.
    pub salt_path: Option<PathBuf>,

    /// Opaque handle to an external key-wrapping service (HSM/TEE). Never
    /// wired up by this crate — see `Wrapper` in `keys.rs`.
    pub wrapper_handle: Option<String>,
}

impl WalletConfig {
    #[must_use]
    pub fn master_salt(&self) -> &[u8] {
        self.master_salt.as_deref().unwrap_or(DEFAULT_MASTER_SALT)
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            passphrase: String::new(),
            storage: StorageConfig::Memory,
            master_salt: None,
            salt_path: dirs::config_dir().map(|d| d.join("sigil").join("master.salt")),
            wrapper_handle: None,
        }
    }
}
