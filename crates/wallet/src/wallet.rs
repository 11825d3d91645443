use base64::Engine;

use crate::config::{StorageConfig, WalletConfig};
use crate::crypto::{self, KeyMaterial};
use crate::error::{Result, WalletError};
use crate::metadata::{self, Metadata};
use crate::storage::{HttpDocumentBackend, MemoryBackend, StorageBackend, StorageItem};

const LOCAL_PREFIX: &str = "_local/";

/// An open wallet: a storage backend, the master-derived metadata vault,
/// and the item CRUD/key API built on top of them.
///
/// No private key material is ever cached here — only the metadata subkeys
/// needed to wrap and unwrap per-item content keys live for the lifetime of
/// the handle.
pub struct Wallet {
    pub(crate) backend: Box<dyn StorageBackend>,
    pub(crate) metadata: Metadata,
}

impl Wallet {
    /// Opens a wallet against the backend named in `config`, deriving the
    /// master key from `config.passphrase` and loading (or creating, on
    /// first open) the metadata vault. A wrong passphrase surfaces as
    /// `CryptoFailure` and no `Wallet` is constructed.
    pub fn open(config: WalletConfig) -> Result<Self> {
        let backend: Box<dyn StorageBackend> = match &config.storage {
            StorageConfig::Memory => Box::new(MemoryBackend::new()),
            StorageConfig::Http { base_url } => Box::new(HttpDocumentBackend::new(base_url.clone())),
        };

        let master_key = crypto::derive_master_key(&config.passphrase, config.master_salt());
        tracing::debug!("deriving master key and loading metadata vault");
        let metadata = metadata::load_or_create(backend.as_ref(), &master_key)?;

        Ok(Self { backend, metadata })
    }

    /// Derives the opaque, deterministic storage id for a logical id: the
    /// searchable-encrypted id the backend actually sees, so the backend
    /// never learns the logical key itself.
    fn searchable_id(&self, id: &str) -> Result<String> {
        let eid = crypto::encrypt_searchable(&self.metadata.hmac_key, &self.metadata.name_key, id.as_bytes())?;
        Ok(base64::engine::general_purpose::STANDARD.encode(eid))
    }

    fn write_raw(&self, id: &str, plaintext: &[u8], creating: bool) -> Result<()> {
        let eid = self.searchable_id(id)?;
        let item_key = KeyMaterial::random();
        let wrapped_item_key = crypto::encrypt(&self.metadata.item_key_key, &item_key.0)?;
        let ciphertext = crypto::encrypt(&item_key, plaintext)?;
        let storage_item = StorageItem::new(
            &eid,
            ciphertext,
            Some(base64::engine::general_purpose::STANDARD.encode(wrapped_item_key)),
        );

        if creating {
            self.backend.create(storage_item)?;
        } else {
            self.backend.update(storage_item)?;
        }
        Ok(())
    }

    /// Creates a new item under `id` with a freshly generated content key.
    pub fn create(&self, id: &str, plaintext: &[u8]) -> Result<()> {
        tracing::debug!(id, "creating item");
        self.write_raw(id, plaintext, true)
    }

    /// Reads an item by its logical id. Ids under the `_local/` prefix are
    /// internal and always return `PolicyViolation` through this public
    /// entry point — use [`Wallet::read_unchecked`] only from within the
    /// crate for those.
    pub fn read(&self, id: &str) -> Result<Vec<u8>> {
        if id.starts_with(LOCAL_PREFIX) {
            return Err(WalletError::PolicyViolation(format!(
                "item cannot be extracted: {id}"
            )));
        }
        self.read_unchecked(id)
    }

    /// Reads an item without the `_local/` policy check. Used internally by
    /// the key API to load signing keys that must never be handed back
    /// through the public `read`.
    pub fn read_unchecked(&self, id: &str) -> Result<Vec<u8>> {
        let eid = self.searchable_id(id)?;
        let item = self.backend.read(&eid)?;
        let wrapped_b64 = item
            .item_key
            .as_ref()
            .ok_or_else(|| WalletError::EncodingFailure("item missing wrapped content key".into()))?;
        let wrapped = base64::engine::general_purpose::STANDARD
            .decode(wrapped_b64)
            .map_err(|e| WalletError::EncodingFailure(e.to_string()))?;
        let item_key_bytes = crypto::decrypt(&self.metadata.item_key_key, &wrapped)?;
        let item_key_bytes: [u8; 32] = item_key_bytes
            .try_into()
            .map_err(|_| WalletError::EncodingFailure("content key must be 32 bytes".into()))?;
        let item_key = KeyMaterial::from_bytes(item_key_bytes);
        crypto::decrypt(&item_key, &item.ciphertext)
    }

    /// Writes under a `_local/`-namespaced id, bypassing the public read
    /// policy check on the way in (the item API's own `create`/`read` still
    /// enforce it on the way out). Used by the key API to store signing
    /// keys.
    pub(crate) fn write_local(&self, id: &str, plaintext: &[u8]) -> Result<()> {
        self.write_raw(id, plaintext, true)
    }

    /// Updates an existing item, always rotating its content key.
    pub fn update(&self, id: &str, plaintext: &[u8]) -> Result<()> {
        tracing::debug!(id, "updating item, rotating content key");
        self.write_raw(id, plaintext, false)
    }

    /// Deletes an item. A single backend call — idempotence is
    /// backend-dependent and not emulated here.
    pub fn delete(&self, id: &str) -> Result<()> {
        tracing::debug!(id, "deleting item");
        let eid = self.searchable_id(id)?;
        self.backend.delete(&eid)
    }
}
