use base64::Engine;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::crypto::{self, KeyMaterial};
use crate::error::{Result, WalletError};
use crate::storage::{StorageBackend, StorageItem};

const METADATA_ID: &str = "metadata";

/// The six subkeys every wallet derives on first open and then reuses for
/// the lifetime of the store: tag/type/name keys for deterministic,
/// searchable encryption of item metadata, an HMAC key feeding that
/// determinism, and a key-wrapping key for per-item content keys.
pub struct Metadata {
    pub tag_name_key: KeyMaterial,
    pub tag_value_key: KeyMaterial,
    pub hmac_key: [u8; 64],
    pub type_key: KeyMaterial,
    pub name_key: KeyMaterial,
    pub item_key_key: KeyMaterial,
}

impl Drop for Metadata {
    fn drop(&mut self) {
        self.hmac_key.zeroize();
    }
}

#[derive(Serialize, Deserialize)]
struct MetadataRepr {
    tag_name_key: String,
    tag_value_key: String,
    hmac_key: String,
    type_key: String,
    name_key: String,
    item_key_key: String,
}

fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn b64_decode(s: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| WalletError::EncodingFailure(e.to_string()))
}

fn random_32() -> Result<[u8; 32]> {
    let mut buf = [0u8; 32];
    getrandom::fill(&mut buf).map_err(|e| WalletError::CryptoFailure(e.to_string()))?;
    Ok(buf)
}

fn random_64() -> Result<[u8; 64]> {
    let mut buf = [0u8; 64];
    getrandom::fill(&mut buf).map_err(|e| WalletError::CryptoFailure(e.to_string()))?;
    Ok(buf)
}

impl Metadata {
    fn generate() -> Result<Self> {
        Ok(Self {
            tag_name_key: KeyMaterial::from_bytes(random_32()?),
            tag_value_key: KeyMaterial::from_bytes(random_32()?),
            hmac_key: random_64()?,
            type_key: KeyMaterial::from_bytes(random_32()?),
            name_key: KeyMaterial::from_bytes(random_32()?),
            item_key_key: KeyMaterial::from_bytes(random_32()?),
        })
    }

    fn to_repr(&self) -> MetadataRepr {
        MetadataRepr {
            tag_name_key: b64(&self.tag_name_key.0),
            tag_value_key: b64(&self.tag_value_key.0),
            hmac_key: b64(&self.hmac_key),
            type_key: b64(&self.type_key.0),
            name_key: b64(&self.name_key.0),
            item_key_key: b64(&self.item_key_key.0),
        }
    }

    fn from_repr(repr: MetadataRepr) -> Result<Self> {
        let tag_name_key = to_key(&repr.tag_name_key)?;
        let tag_value_key = to_key(&repr.tag_value_key)?;
        let type_key = to_key(&repr.type_key)?;
        let name_key = to_key(&repr.name_key)?;
        let item_key_key = to_key(&repr.item_key_key)?;

        let hmac_bytes = b64_decode(&repr.hmac_key)?;
        let mut hmac_key = [0u8; 64];
        if hmac_bytes.len() != 64 {
            return Err(WalletError::EncodingFailure("hmac_key must be 64 bytes".into()));
        }
        hmac_key.copy_from_slice(&hmac_bytes);

        Ok(Self {
            tag_name_key,
            tag_value_key,
            hmac_key,
            type_key,
            name_key,
            item_key_key,
        })
    }
}

fn to_key(encoded: &str) -> Result<KeyMaterial> {
    let bytes = b64_decode(encoded)?;
    if bytes.len() != 32 {
        return Err(WalletError::EncodingFailure("subkey must be 32 bytes".into()));
    }
    let mut buf = [0u8; 32];
    buf.copy_from_slice(&bytes);
    Ok(KeyMaterial::from_bytes(buf))
}

/// Loads the metadata vault, creating it via CSPRNG on first open. A wrong
/// passphrase surfaces as `CryptoFailure` here — no `Wallet` handle is ever
/// constructed on that path, since metadata is the first thing a wallet
/// reads.
pub fn load_or_create(backend: &dyn StorageBackend, master_key: &KeyMaterial) -> Result<Metadata> {
    match backend.read(METADATA_ID) {
        Ok(item) => {
            let plaintext = crypto::decrypt(master_key, &item.ciphertext)?;
            let repr: MetadataRepr =
                serde_json::from_slice(&plaintext).map_err(|e| WalletError::EncodingFailure(e.to_string()))?;
            Metadata::from_repr(repr)
        }
        Err(WalletError::NotFound(_)) => {
            let metadata = Metadata::generate()?;
            let plaintext =
                serde_json::to_vec(&metadata.to_repr()).map_err(|e| WalletError::EncodingFailure(e.to_string()))?;
            let ciphertext = crypto::encrypt(master_key, &plaintext)?;
            backend.create(StorageItem::new(METADATA_ID, ciphertext, None))?;
            Ok(metadata)
        }
        Err(e) => Err(e),
    }
}
