use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{StorageBackend, StorageItem};
use crate::error::{Result, WalletError};

#[derive(Serialize, Deserialize)]
struct CouchDoc {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    rev: Option<String>,
    ciphertext: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    item_key: Option<String>,
}

impl CouchDoc {
    fn from_item(item: &StorageItem) -> Self {
        Self {
            id: item.id.clone(),
            rev: item.revision.clone(),
            ciphertext: base64::engine::general_purpose::STANDARD.encode(&item.ciphertext),
            item_key: item.item_key.clone(),
        }
    }

    fn into_item(self) -> Result<StorageItem> {
        let ciphertext = base64::engine::general_purpose::STANDARD
            .decode(self.ciphertext)
            .map_err(|e| WalletError::EncodingFailure(e.to_string()))?;
        Ok(StorageItem {
            id: self.id,
            revision: self.rev,
            ciphertext,
            item_key: self.item_key,
        })
    }
}

/// `StorageBackend` over a CouchDB-shaped REST document store, reached with
/// a blocking `reqwest` client to keep the wallet's synchronous contract.
/// `_rev` is read back on every response and round-tripped on `update`/
/// `delete` for CouchDB's optimistic-concurrency check; HTTP 404 maps to
/// `NotFound`, any other `>= 400` to `BackendFailure`.
pub struct HttpDocumentBackend {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpDocumentBackend {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn doc_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), id)
    }
}

impl StorageBackend for HttpDocumentBackend {
    fn create(&self, item: StorageItem) -> Result<StorageItem> {
        let doc = CouchDoc::from_item(&item);
        let resp = self
            .client
            .put(self.doc_url(&item.id))
            .json(&doc)
            .send()
            .map_err(|e| WalletError::BackendFailure(e.to_string()))?;

        if resp.status().as_u16() >= 400 {
            return Err(WalletError::BackendFailure(format!(
                "create failed with status {}",
                resp.status()
            )));
        }
        self.read(&item.id)
    }

    fn read(&self, id: &str) -> Result<StorageItem> {
        let resp = self
            .client
            .get(self.doc_url(id))
            .send()
            .map_err(|e| WalletError::BackendFailure(e.to_string()))?;

        if resp.status().as_u16() == 404 {
            return Err(WalletError::NotFound(id.to_string()));
        }
        if resp.status().as_u16() >= 400 {
            return Err(WalletError::BackendFailure(format!(
                "read failed with status {}",
                resp.status()
            )));
        }
        let doc: CouchDoc = resp.json().map_err(|e| WalletError::EncodingFailure(e.to_string()))?;
        doc.into_item()
    }

    fn update(&self, item: StorageItem) -> Result<StorageItem> {
        let current = self.read(&item.id)?;
        let mut next = item;
        next.revision = current.revision;
        let doc = CouchDoc::from_item(&next);

        let resp = self
            .client
            .put(self.doc_url(&next.id))
            .json(&doc)
            .send()
            .map_err(|e| WalletError::BackendFailure(e.to_string()))?;

        if resp.status().as_u16() == 404 {
            return Err(WalletError::NotFound(next.id.clone()));
        }
        if resp.status().as_u16() >= 400 {
            return Err(WalletError::BackendFailure(format!(
                "update failed with status {}",
                resp.status()
            )));
        }
        self.read(&next.id)
    }

    fn delete(&self, id: &str) -> Result<()> {
        let current = self.read(id)?;
        let rev = current.revision.unwrap_or_default();

        let resp = self
            .client
            .delete(self.doc_url(id))
            .query(&[("rev", rev.as_str())])
            .send()
            .map_err(|e| WalletError::BackendFailure(e.to_string()))?;

        if resp.status().as_u16() == 404 {
            return Err(WalletError::NotFound(id.to_string()));
        }
        if resp.status().as_u16() >= 400 {
            return Err(WalletError::BackendFailure(format!(
                "delete failed with status {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
