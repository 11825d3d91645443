use crate::did::DidDocument;
use crate::error::{EnvelopeError, Result};

const METHOD_PREFIX: &str = "did:web:";

fn resolve_url(did: &str) -> Result<String> {
    let rest = did
        .strip_prefix(METHOD_PREFIX)
        .ok_or_else(|| EnvelopeError::EncodingFailure(format!("not a did:web identifier: {did}")))?;

    let mut parts = rest.split(':');
    let host = parts
        .next()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| EnvelopeError::EncodingFailure(format!("missing host in did:web identifier: {did}")))?;
    let path_parts: Vec<&str> = parts.collect();

    Ok(if path_parts.is_empty() {
        format!("https://{host}/.well-known/did.json")
    } else {
        format!("https://{host}/{}/did.json", path_parts.join("/"))
    })
}

/// Resolves a `did:web:<host>[:path]` identifier by fetching its document
/// over HTTPS. Requires `doc.id == did` and a non-empty `publicKey`; either
/// violation is reported as `PolicyViolation` rather than a bare parse
/// failure, since the document itself parsed fine.
pub fn resolve(did: &str) -> Result<DidDocument> {
    let url = resolve_url(did)?;
    tracing::debug!(%url, "resolving did:web document");

    let client = reqwest::blocking::Client::new();
    let response = client
        .get(&url)
        .header("Accept", "application/json")
        .send()
        .map_err(|e| EnvelopeError::Wallet(sigil_wallet::WalletError::BackendFailure(e.to_string())))?;

    if !response.status().is_success() {
        return Err(EnvelopeError::Wallet(sigil_wallet::WalletError::BackendFailure(
            format!("did:web fetch returned status {}", response.status()),
        )));
    }

    let doc: DidDocument = response
        .json()
        .map_err(|e| EnvelopeError::EncodingFailure(e.to_string()))?;

    if doc.id != did {
        return Err(EnvelopeError::PolicyViolation(format!(
            "document id {} does not match requested did {did}",
            doc.id
        )));
    }
    if doc.public_key.is_empty() {
        return Err(EnvelopeError::PolicyViolation(
            "resolved document has no publicKey entries".into(),
        ));
    }

    Ok(doc)
}
