use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use serde::{Deserialize, Serialize};
use sigil_wallet::crypto::KeyMaterial;
use sigil_wallet::{keys, Wallet};

use crate::error::{EnvelopeError, Result};

const NONCE_LEN: usize = 24;
const ENC: &str = "xchacha20poly1305_ietf";
const TYP: &str = "JWM/1.0";

/// A JWM-shaped multi-recipient envelope: the four fields DIDComm v1's
/// encrypted-message wire format specifies, each base64url (no padding)
/// encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub protected: String,
    pub iv: String,
    pub ciphertext: String,
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProtectedHeader {
    enc: String,
    typ: String,
    alg: Algorithm,
    recipients: Vec<Recipient>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Algorithm {
    Authcrypt,
    Anoncrypt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Recipient {
    header: RecipientHeader,
    encrypted_key: String,
}

/// `sender` and `iv` are always present, empty for anoncrypt rather than
/// omitted, so the wire shape is uniform across both algorithms.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecipientHeader {
    kid: String,
    #[serde(default)]
    sender: String,
    #[serde(default)]
    iv: String,
}

/// Builds a multi-recipient envelope addressed to `recipient_kids`.
///
/// `sender_kid: Some(_)` selects authcrypt per recipient (the recipient's
/// slot also carries the sender's kid, anonymously sealed so only that
/// recipient can learn it); `None` selects anoncrypt, which reveals nothing
/// about who sent the message.
pub fn pack(wallet: &Wallet, sender_kid: Option<&str>, recipient_kids: &[String], message: &[u8]) -> Result<Envelope> {
    let cek = KeyMaterial::random();
    let alg = if sender_kid.is_some() {
        Algorithm::Authcrypt
    } else {
        Algorithm::Anoncrypt
    };

    let mut recipients = Vec::with_capacity(recipient_kids.len());
    for recipient_kid in recipient_kids {
        let (encrypted_key, sender, iv) = match sender_kid {
            Some(sender_kid) => {
                let (wrapped_cek, nonce) = keys::seal(wallet, sender_kid, recipient_kid, &cek.0)?;
                let sealed_sender = keys::seal_anonymous(recipient_kid, sender_kid.as_bytes())?;
                (
                    wrapped_cek,
                    URL_SAFE_NO_PAD.encode(sealed_sender),
                    URL_SAFE_NO_PAD.encode(nonce),
                )
            }
            None => {
                let wrapped_cek = keys::seal_anonymous(recipient_kid, &cek.0)?;
                (wrapped_cek, String::new(), String::new())
            }
        };

        recipients.push(Recipient {
            header: RecipientHeader {
                kid: recipient_kid.clone(),
                sender,
                iv,
            },
            encrypted_key: URL_SAFE_NO_PAD.encode(encrypted_key),
        });
    }

    let header = ProtectedHeader {
        enc: ENC.to_string(),
        typ: TYP.to_string(),
        alg,
        recipients,
    };
    let header_json = serde_json::to_vec(&header).map_err(|e| EnvelopeError::EncodingFailure(e.to_string()))?;
    let protected = URL_SAFE_NO_PAD.encode(header_json);

    let aead = XChaCha20Poly1305::new((&cek.0).into());
    let mut nonce = [0u8; NONCE_LEN];
    getrandom::fill(&mut nonce).map_err(|e| EnvelopeError::EncodingFailure(e.to_string()))?;
    let ct_and_tag = aead
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: message,
                aad: protected.as_bytes(),
            },
        )
        .map_err(|_| EnvelopeError::Wallet(sigil_wallet::WalletError::CryptoFailure("message encryption failed".into())))?;

    let tag_offset = ct_and_tag.len() - 16;
    let (ciphertext, tag) = ct_and_tag.split_at(tag_offset);

    tracing::debug!(recipients = recipient_kids.len(), ?alg, "packed envelope");

    Ok(Envelope {
        protected,
        iv: URL_SAFE_NO_PAD.encode(nonce),
        ciphertext: URL_SAFE_NO_PAD.encode(ciphertext),
        tag: URL_SAFE_NO_PAD.encode(tag),
    })
}

/// Unpacks an envelope, returning the plaintext and (for authcrypt) the
/// sender's kid. Scans `recipients` for the first slot whose `kid` this
/// wallet holds a key for. A sealed-box open failure inside that matched
/// slot is fatal and is never retried against a later slot, even if one
/// would also match.
pub fn unpack(wallet: &Wallet, envelope: &Envelope) -> Result<(Vec<u8>, Option<String>)> {
    let header_json = URL_SAFE_NO_PAD
        .decode(&envelope.protected)
        .map_err(|e| EnvelopeError::EncodingFailure(e.to_string()))?;
    let header: ProtectedHeader =
        serde_json::from_slice(&header_json).map_err(|e| EnvelopeError::EncodingFailure(e.to_string()))?;

    let matched = header
        .recipients
        .iter()
        .find(|r| keys::key_exists(wallet, &r.header.kid))
        .ok_or(EnvelopeError::NoMatchingRecipient)?;

    let encrypted_key = URL_SAFE_NO_PAD
        .decode(&matched.encrypted_key)
        .map_err(|e| EnvelopeError::EncodingFailure(e.to_string()))?;

    let (cek_bytes, sender_kid) = match header.alg {
        Algorithm::Authcrypt => {
            if matched.header.sender.is_empty() || matched.header.iv.is_empty() {
                return Err(EnvelopeError::EncodingFailure(
                    "authcrypt recipient missing sender or iv".into(),
                ));
            }
            let sealed_sender = URL_SAFE_NO_PAD
                .decode(&matched.header.sender)
                .map_err(|e| EnvelopeError::EncodingFailure(e.to_string()))?;
            let sender_kid_bytes = keys::open_anonymous(wallet, &matched.header.kid, &sealed_sender)?;
            let sender_kid =
                String::from_utf8(sender_kid_bytes).map_err(|e| EnvelopeError::EncodingFailure(e.to_string()))?;

            let nonce = URL_SAFE_NO_PAD
                .decode(&matched.header.iv)
                .map_err(|e| EnvelopeError::EncodingFailure(e.to_string()))?;
            let cek_bytes = keys::open(wallet, &matched.header.kid, &sender_kid, &encrypted_key, &nonce)?;
            (cek_bytes, Some(sender_kid))
        }
        Algorithm::Anoncrypt => {
            let cek_bytes = keys::open_anonymous(wallet, &matched.header.kid, &encrypted_key)?;
            (cek_bytes, None)
        }
    };

    let cek_bytes: [u8; 32] = cek_bytes
        .try_into()
        .map_err(|_| EnvelopeError::EncodingFailure("content encryption key must be 32 bytes".into()))?;
    let cek = KeyMaterial::from_bytes(cek_bytes);

    let nonce = URL_SAFE_NO_PAD
        .decode(&envelope.iv)
        .map_err(|e| EnvelopeError::EncodingFailure(e.to_string()))?;
    let ciphertext = URL_SAFE_NO_PAD
        .decode(&envelope.ciphertext)
        .map_err(|e| EnvelopeError::EncodingFailure(e.to_string()))?;
    let tag = URL_SAFE_NO_PAD
        .decode(&envelope.tag)
        .map_err(|e| EnvelopeError::EncodingFailure(e.to_string()))?;

    let mut ct_and_tag = ciphertext;
    ct_and_tag.extend_from_slice(&tag);

    let aead = XChaCha20Poly1305::new((&cek.0).into());
    let plaintext = aead
        .decrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: &ct_and_tag,
                aad: envelope.protected.as_bytes(),
            },
        )
        .map_err(|_| EnvelopeError::Wallet(sigil_wallet::WalletError::CryptoFailure("message decryption failed".into())))?;

    Ok((plaintext, sender_kid))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use sigil_wallet::{keys::create_key, StorageConfig, WalletConfig};

    fn test_wallet(passphrase: &str) -> Wallet {
        Wallet::open(WalletConfig {
            passphrase: passphrase.into(),
            storage: StorageConfig::Memory,
            master_salt: None,
            salt_path: None,
            wrapper_handle: None,
        })
        .unwrap()
    }

    #[test]
    fn test_authcrypt_pack_unpack_roundtrip_reveals_sender() {
        let alice = test_wallet("alice-pass");
        let bob = test_wallet("bob-pass");

        let alice_kid = create_key(&alice).unwrap();
        let bob_kid = create_key(&bob).unwrap();

        // Bob's wallet needs to know Alice's public key to locate her, but
        // sealing/opening only needs the kid strings (public keys), so no
        // private material crosses between the two wallets here.
        let envelope = pack(&alice, Some(&alice_kid), &[bob_kid.clone()], b"hello bob").unwrap();
        let (plaintext, sender) = unpack(&bob, &envelope).unwrap();

        assert_eq!(plaintext, b"hello bob");
        assert_eq!(sender.as_deref(), Some(alice_kid.as_str()));
    }

    #[test]
    fn test_anoncrypt_pack_unpack_roundtrip_hides_sender() {
        let bob = test_wallet("bob-pass");
        let bob_kid = create_key(&bob).unwrap();

        let envelope = pack(&bob, None, &[bob_kid.clone()], b"anonymous message").unwrap();
        let (plaintext, sender) = unpack(&bob, &envelope).unwrap();

        assert_eq!(plaintext, b"anonymous message");
        assert_eq!(sender, None);
    }

    #[test]
    fn test_unpack_with_no_matching_recipient_key_fails() {
        let alice = test_wallet("alice-pass");
        let bob = test_wallet("bob-pass");
        let carol = test_wallet("carol-pass");

        let alice_kid = create_key(&alice).unwrap();
        let bob_kid = create_key(&bob).unwrap();

        let envelope = pack(&alice, Some(&alice_kid), &[bob_kid], b"for bob only").unwrap();
        assert!(matches!(
            unpack(&carol, &envelope),
            Err(EnvelopeError::NoMatchingRecipient)
        ));
    }

    #[test]
    fn test_multi_recipient_envelope_opens_for_each_recipient() {
        let alice = test_wallet("alice-pass");
        let bob = test_wallet("bob-pass");
        let carol = test_wallet("carol-pass");

        let alice_kid = create_key(&alice).unwrap();
        let bob_kid = create_key(&bob).unwrap();
        let carol_kid = create_key(&carol).unwrap();

        let envelope = pack(
            &alice,
            Some(&alice_kid),
            &[bob_kid, carol_kid],
            b"broadcast to both",
        )
        .unwrap();

        let (plaintext_bob, _) = unpack(&bob, &envelope).unwrap();
        let (plaintext_carol, _) = unpack(&carol, &envelope).unwrap();
        assert_eq!(plaintext_bob, b"broadcast to both");
        assert_eq!(plaintext_carol, b"broadcast to both");
    }

    #[test]
    fn test_tampered_ciphertext_fails_to_unpack_with_crypto_failure() {
        let alice = test_wallet("alice-pass");
        let bob = test_wallet("bob-pass");

        let alice_kid = create_key(&alice).unwrap();
        let bob_kid = create_key(&bob).unwrap();

        let mut envelope = pack(&alice, Some(&alice_kid), &[bob_kid], b"integrity check").unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(&envelope.ciphertext).unwrap();
        raw[0] ^= 0x01;
        envelope.ciphertext = URL_SAFE_NO_PAD.encode(raw);

        assert!(matches!(
            unpack(&bob, &envelope),
            Err(EnvelopeError::Wallet(sigil_wallet::WalletError::CryptoFailure(_)))
        ));
    }

    #[test]
    fn test_anoncrypt_recipient_header_has_empty_sender_and_iv() {
        let bob = test_wallet("bob-pass");
        let bob_kid = create_key(&bob).unwrap();

        let envelope = pack(&bob, None, &[bob_kid], b"anonymous message").unwrap();
        let header_json = URL_SAFE_NO_PAD.decode(&envelope.protected).unwrap();
        let header: ProtectedHeader = serde_json::from_slice(&header_json).unwrap();

        assert_eq!(header.alg, Algorithm::Anoncrypt);
        for recipient in &header.recipients {
            assert_eq!(recipient.header.sender, "");
            assert_eq!(recipient.header.iv, "");
        }
    }

    #[test]
    fn test_protected_header_serializes_lowercase_alg_and_enc() {
        let bob = test_wallet("bob-pass");
        let bob_kid = create_key(&bob).unwrap();

        let envelope = pack(&bob, None, &[bob_kid], b"hi").unwrap();
        let header_json = URL_SAFE_NO_PAD.decode(&envelope.protected).unwrap();
        let raw = String::from_utf8(header_json).unwrap();

        assert!(raw.contains("\"alg\":\"anoncrypt\""));
        assert!(raw.contains("\"enc\":\"xchacha20poly1305_ietf\""));
    }
}
