use std::collections::HashMap;
use std::sync::Mutex;

use super::{StorageBackend, StorageItem};
use crate::error::{Result, WalletError};

/// In-memory `StorageBackend`, useful for tests and short-lived demos. A
/// `Mutex` guards the map the way the corpus's other single-process stores
/// do, even though a single wallet handle is never used from more than one
/// thread at a time in practice.
#[derive(Default)]
pub struct MemoryBackend {
    items: Mutex<HashMap<String, StorageItem>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn create(&self, mut item: StorageItem) -> Result<StorageItem> {
        let mut items = self.items.lock().map_err(|_| WalletError::BackendFailure("poisoned lock".into()))?;
        item.revision = Some("1".to_string());
        items.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    fn read(&self, id: &str) -> Result<StorageItem> {
        let items = self.items.lock().map_err(|_| WalletError::BackendFailure("poisoned lock".into()))?;
        items
            .get(id)
            .cloned()
            .ok_or_else(|| WalletError::NotFound(id.to_string()))
    }

    fn update(&self, mut item: StorageItem) -> Result<StorageItem> {
        let mut items = self.items.lock().map_err(|_| WalletError::BackendFailure("poisoned lock".into()))?;
        let current = items
            .get(&item.id)
            .ok_or_else(|| WalletError::NotFound(item.id.clone()))?;
        let next_rev = current
            .revision
            .as_deref()
            .and_then(|r| r.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        item.revision = Some(next_rev.to_string());
        items.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    fn delete(&self, id: &str) -> Result<()> {
        let mut items = self.items.lock().map_err(|_| WalletError::BackendFailure("poisoned lock".into()))?;
        items.remove(id).ok_or_else(|| WalletError::NotFound(id.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_create_then_read_roundtrip() {
        let backend = MemoryBackend::new();
        let item = StorageItem::new("metadata", vec![1, 2, 3], None);
        backend.create(item).unwrap();

        let read = backend.read("metadata").unwrap();
        assert_eq!(read.ciphertext, vec![1, 2, 3]);
        assert_eq!(read.revision.as_deref(), Some("1"));
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let backend = MemoryBackend::new();
        assert!(matches!(backend.read("nope"), Err(WalletError::NotFound(_))));
    }

    #[test]
    fn test_update_bumps_revision() {
        let backend = MemoryBackend::new();
        backend.create(StorageItem::new("item-1", vec![1], None)).unwrap();

        let updated = backend.update(StorageItem::new("item-1", vec![2], None)).unwrap();
        assert_eq!(updated.revision.as_deref(), Some("2"));
        assert_eq!(updated.ciphertext, vec![2]);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.update(StorageItem::new("ghost", vec![1], None)).unwrap_err();
        assert!(matches!(err, WalletError::NotFound(_)));
    }

    #[test]
    fn test_delete_then_read_is_not_found() {
        let backend = MemoryBackend::new();
        backend.create(StorageItem::new("item-1", vec![1], None)).unwrap();
        backend.delete("item-1").unwrap();
        assert!(matches!(backend.read("item-1"), Err(WalletError::NotFound(_))));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let backend = MemoryBackend::new();
        assert!(matches!(backend.delete("ghost"), Err(WalletError::NotFound(_))));
    }
}
