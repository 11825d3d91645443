mod http;
mod memory;

pub use http::HttpDocumentBackend;
pub use memory::MemoryBackend;

use crate::error::Result;

/// An opaque, already-encrypted record as the wallet hands it to a backend.
/// Backends never see plaintext and never interpret `ciphertext` or
/// `item_key` — they only persist and return them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageItem {
    pub id: String,
    pub revision: Option<String>,
    pub ciphertext: Vec<u8>,
    pub item_key: Option<String>,
}

impl StorageItem {
    #[must_use]
    pub fn new(id: impl Into<String>, ciphertext: Vec<u8>, item_key: Option<String>) -> Self {
        Self {
            id: id.into(),
            revision: None,
            ciphertext,
            item_key,
        }
    }
}

/// Storage abstraction the wallet's item and metadata layers are built on.
/// Two shapes in this crate: an in-process [`MemoryBackend`] and a
/// CouchDB-shaped [`HttpDocumentBackend`]; both operate purely on
/// [`StorageItem`] and never see plaintext.
pub trait StorageBackend: Send + Sync {
    fn create(&self, item: StorageItem) -> Result<StorageItem>;
    fn read(&self, id: &str) -> Result<StorageItem>;
    fn update(&self, item: StorageItem) -> Result<StorageItem>;
    fn delete(&self, id: &str) -> Result<()>;
}
