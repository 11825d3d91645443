use sha2::{Digest, Sha256};
use sigil_wallet::{keys, Wallet};

use crate::did::{AuthenticationEntry, AuthorizationSection, DidDocument, PublicKeyEntry, Rule, RuleCondition};
use crate::error::{EnvelopeError, Result};

const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";
const MULTIHASH_SHA256_PREFIX: [u8; 2] = [0x12, 0x20];

/// Generates a `did:peer` document: a fresh Ed25519 key, a single
/// authorization rule granting that key the right to register the document,
/// and a content-addressed `id` hashed over the document's own canonical
/// JSON (with `id` itself still empty at hash time).
pub fn generate(wallet: &Wallet) -> Result<DidDocument> {
    let kid = keys::create_key(wallet)?;
    let short_id = format!("#{}", &kid[..8.min(kid.len())]);

    let rule_condition = RuleCondition { id: short_id.clone() };
    let unhashed_rule = Rule {
        id: String::new(),
        grant: vec!["register".to_string()],
        when: rule_condition,
    };
    let rule_json =
        serde_json::to_vec(&unhashed_rule).map_err(|e| EnvelopeError::EncodingFailure(e.to_string()))?;
    let rule_digest = Sha256::digest(&rule_json);
    let rule_id = bs58::encode(&rule_digest[..8]).into_string();

    let rule = Rule {
        id: rule_id,
        grant: vec!["register".to_string()],
        when: RuleCondition { id: short_id.clone() },
    };

    let mut doc = DidDocument {
        context: DID_CONTEXT.to_string(),
        id: String::new(),
        public_key: vec![PublicKeyEntry {
            id: short_id.clone(),
            type_: "Ed25519VerificationKey2018".to_string(),
            controller: "#id".to_string(),
            public_key_base58: Some(kid.clone()),
            ethereum_address: None,
        }],
        authentication: vec![AuthenticationEntry::Reference(short_id)],
        service: None,
        created: None,
        updated: None,
        authorization: Some(AuthorizationSection { rules: vec![rule] }),
    };

    let canonical = serde_json::to_vec(&doc).map_err(|e| EnvelopeError::EncodingFailure(e.to_string()))?;
    let digest = Sha256::digest(&canonical);

    let mut multihash = Vec::with_capacity(MULTIHASH_SHA256_PREFIX.len() + digest.len());
    multihash.extend_from_slice(&MULTIHASH_SHA256_PREFIX);
    multihash.extend_from_slice(&digest);
    doc.id = format!("did:peer:1z{}", bs58::encode(multihash).into_string());

    tracing::debug!(did = %doc.id, "generated did:peer document");
    Ok(doc)
}
