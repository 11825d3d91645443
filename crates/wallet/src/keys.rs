use crypto_box::aead::generic_array::GenericArray;
use crypto_box::aead::{Aead, AeadCore};
use crypto_box::{PublicKey as BoxPublicKey, SalsaBox, SecretKey as BoxSecretKey};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256, Sha512};

use crate::error::{Result, WalletError};
use crate::wallet::Wallet;

const KEY_PREFIX: &str = "_local/keys/";
const NONCE_LEN: usize = 24;

fn key_storage_id(kid: &str) -> String {
    format!("{KEY_PREFIX}{kid}")
}

/// An unused hook for external key-wrapping services (HSM/TEE). Declared to
/// match the shape third-party wrapper integrations would plug into, never
/// constructed or wired into `Wallet::new` — see `WalletConfig::wrapper_handle`.
pub trait Wrapper: Send + Sync {
    fn wrap(&self, key_material: &[u8]) -> Result<Vec<u8>>;
    fn unwrap(&self, wrapped: &[u8]) -> Result<Vec<u8>>;
}

/// Generates a new Ed25519 keypair, stores the 64-byte private key record
/// (seed ‖ public key, matching the wire shape of a conventional Ed25519
/// private key) under an extraction-proof `_local/` id, and returns its
/// base58-encoded public key (the `kid` used everywhere else in the key
/// API).
pub fn create_key(wallet: &Wallet) -> Result<String> {
    let signing_key = SigningKey::generate(&mut OsRng);
    let kid = bs58::encode(signing_key.verifying_key().as_bytes()).into_string();
    wallet.write_local(&key_storage_id(&kid), &signing_key.to_keypair_bytes())?;
    Ok(kid)
}

/// Whether a signing key for `kid` exists in this wallet.
#[must_use]
pub fn key_exists(wallet: &Wallet, kid: &str) -> bool {
    wallet.read_unchecked(&key_storage_id(kid)).is_ok()
}

fn load_signing_key(wallet: &Wallet, kid: &str) -> Result<SigningKey> {
    let bytes = wallet.read_unchecked(&key_storage_id(kid))?;
    let seed: [u8; 32] = bytes
        .get(..32)
        .and_then(|seed| seed.try_into().ok())
        .ok_or_else(|| WalletError::EncodingFailure("private key record must be at least 32 bytes".into()))?;
    Ok(SigningKey::from_bytes(&seed))
}

fn decode_verifying_key(kid: &str) -> Result<VerifyingKey> {
    let bytes = bs58::decode(kid)
        .into_vec()
        .map_err(|e| WalletError::EncodingFailure(e.to_string()))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| WalletError::EncodingFailure("public key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| WalletError::CryptoFailure(e.to_string()))
}

/// Signs `message` with the Ed25519 key identified by `kid`. The key is
/// never cached — it is reloaded from storage on every call.
pub fn sign(wallet: &Wallet, kid: &str, message: &[u8]) -> Result<Vec<u8>> {
    let signing_key = load_signing_key(wallet, kid)?;
    Ok(signing_key.sign(message).to_bytes().to_vec())
}

/// Verifies an Ed25519 signature against the public key encoded in `kid`.
pub fn verify(kid: &str, message: &[u8], signature: &[u8]) -> Result<bool> {
    let verifying_key = decode_verifying_key(kid)?;
    let sig_bytes: [u8; 64] = signature
        .try_into()
        .map_err(|_| WalletError::EncodingFailure("signature must be 64 bytes".into()))?;
    let signature = Signature::from_bytes(&sig_bytes);
    Ok(verifying_key.verify(message, &signature).is_ok())
}

/// Converts an Ed25519 seed to the clamped X25519 scalar used for ECDH, via
/// the standard `SHA-512(seed)[..32]` expansion-and-clamp construction
/// (the same derivation `crypto_sign_ed25519_sk_to_curve25519` in libsodium
/// performs).
fn signing_key_to_x25519_secret(signing_key: &SigningKey) -> BoxSecretKey {
    let hash = Sha512::digest(signing_key.to_bytes());
    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(&hash[..32]);
    scalar[0] &= 248;
    scalar[31] &= 127;
    scalar[31] |= 64;
    BoxSecretKey::from(scalar)
}

/// Converts an Ed25519 public key to its X25519 (Montgomery) counterpart via
/// the standard birational map between the twisted Edwards curve and its
/// Montgomery form, following the construction used by NaCl-compatibility
/// layers (e.g. `crypto_box`'s own `PiDelport-nacl-compat` lineage).
fn verifying_key_to_x25519_public(verifying_key: &VerifyingKey) -> Result<BoxPublicKey> {
    let compressed = curve25519_dalek::edwards::CompressedEdwardsY(verifying_key.to_bytes());
    let edwards_point = compressed
        .decompress()
        .ok_or_else(|| WalletError::CryptoFailure("invalid Ed25519 point".into()))?;
    let montgomery = edwards_point.to_montgomery();
    Ok(BoxPublicKey::from(montgomery.to_bytes()))
}

/// Authenticated seal: encrypts `plaintext` so only `recipient_kid` can open
/// it, and so that opening it with `sender_kid`'s known public key proves
/// authorship. Uses Curve25519 ECDH (via the Ed25519→X25519 birational map)
/// and XSalsa20-Poly1305, matching the NaCl `crypto_box` construction.
///
/// Returns the ciphertext and nonce separately, so callers that need to
/// carry the nonce in its own wire field (e.g. a JWM recipient header's
/// `iv`) don't have to split it back out of a concatenated blob.
pub fn seal(
    wallet: &Wallet,
    sender_kid: &str,
    recipient_kid: &str,
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; NONCE_LEN])> {
    let sender_signing_key = load_signing_key(wallet, sender_kid)?;
    let sender_secret = signing_key_to_x25519_secret(&sender_signing_key);
    let recipient_verifying_key = decode_verifying_key(recipient_kid)?;
    let recipient_public = verifying_key_to_x25519_public(&recipient_verifying_key)?;

    let salsa_box = SalsaBox::new(&recipient_public, &sender_secret);
    let nonce = SalsaBox::generate_nonce(&mut OsRng);
    let ct = salsa_box
        .encrypt(&nonce, plaintext)
        .map_err(|_| WalletError::CryptoFailure("box encrypt failed".into()))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(nonce.as_slice());
    Ok((ct, nonce_bytes))
}

/// Inverse of [`seal`]: opens a box addressed to `recipient_kid` that
/// claims to be from `sender_kid`, given the ciphertext and nonce as
/// returned by `seal`.
pub fn open(
    wallet: &Wallet,
    recipient_kid: &str,
    sender_kid: &str,
    ciphertext: &[u8],
    nonce: &[u8],
) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_LEN {
        return Err(WalletError::EncodingFailure("nonce must be 24 bytes".into()));
    }
    let recipient_signing_key = load_signing_key(wallet, recipient_kid)?;
    let recipient_secret = signing_key_to_x25519_secret(&recipient_signing_key);
    let sender_verifying_key = decode_verifying_key(sender_kid)?;
    let sender_public = verifying_key_to_x25519_public(&sender_verifying_key)?;

    let salsa_box = SalsaBox::new(&sender_public, &recipient_secret);
    salsa_box
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| WalletError::CryptoFailure("box decrypt failed".into()))
}

/// Sealed-box anonymous encryption: a fresh ephemeral X25519 keypair is
/// generated per call, the nonce is derived from
/// `SHA-256(ephemeral_public || recipient_public)[..24]` so it never has to
/// be transmitted, and the output is `ephemeral_public || ciphertext`. The
/// sender's identity is not recoverable from the envelope.
pub fn seal_anonymous(recipient_kid: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
    let recipient_verifying_key = decode_verifying_key(recipient_kid)?;
    let recipient_public = verifying_key_to_x25519_public(&recipient_verifying_key)?;

    let ephemeral_secret = BoxSecretKey::generate(&mut OsRng);
    let ephemeral_public = ephemeral_secret.public_key();

    let nonce = sealed_box_nonce(ephemeral_public.as_bytes(), recipient_public.as_bytes());

    let salsa_box = SalsaBox::new(&recipient_public, &ephemeral_secret);
    let ct = salsa_box
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .map_err(|_| WalletError::CryptoFailure("sealed box encrypt failed".into()))?;

    let mut out = Vec::with_capacity(32 + ct.len());
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.extend_from_slice(&ct);
    Ok(out)
}

/// Inverse of [`seal_anonymous`].
pub fn open_anonymous(wallet: &Wallet, recipient_kid: &str, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < 32 {
        return Err(WalletError::EncodingFailure("sealed message too short".into()));
    }
    let (ephemeral_public_bytes, ct) = sealed.split_at(32);
    let ephemeral_public_bytes: [u8; 32] = ephemeral_public_bytes
        .try_into()
        .map_err(|_| WalletError::EncodingFailure("ephemeral key must be 32 bytes".into()))?;
    let ephemeral_public = BoxPublicKey::from(ephemeral_public_bytes);

    let recipient_signing_key = load_signing_key(wallet, recipient_kid)?;
    let recipient_secret = signing_key_to_x25519_secret(&recipient_signing_key);
    let recipient_public = recipient_secret.public_key();

    let nonce = sealed_box_nonce(ephemeral_public.as_bytes(), recipient_public.as_bytes());

    let salsa_box = SalsaBox::new(&ephemeral_public, &recipient_secret);
    salsa_box
        .decrypt(GenericArray::from_slice(&nonce), ct)
        .map_err(|_| WalletError::CryptoFailure("sealed box decrypt failed".into()))
}

fn sealed_box_nonce(ephemeral_public: &[u8; 32], recipient_public: &[u8; 32]) -> [u8; NONCE_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(ephemeral_public);
    hasher.update(recipient_public);
    let digest = hasher.finalize();
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&digest[..NONCE_LEN]);
    nonce
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::{StorageConfig, WalletConfig};

    fn test_wallet() -> Wallet {
        let config = WalletConfig {
            passphrase: "test-passphrase".into(),
            storage: StorageConfig::Memory,
            master_salt: None,
            salt_path: None,
            wrapper_handle: None,
        };
        Wallet::open(config).unwrap()
    }

    #[test]
    fn test_create_key_and_key_exists() {
        let wallet = test_wallet();
        let kid = create_key(&wallet).unwrap();
        assert!(key_exists(&wallet, &kid));
        assert!(!key_exists(&wallet, "unknown-kid"));
    }

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let wallet = test_wallet();
        let kid = create_key(&wallet).unwrap();
        let sig = sign(&wallet, &kid, b"hello").unwrap();
        assert!(verify(&kid, b"hello", &sig).unwrap());
    }

    #[test]
    fn test_verify_rejects_tampered_message() {
        let wallet = test_wallet();
        let kid = create_key(&wallet).unwrap();
        let sig = sign(&wallet, &kid, b"hello").unwrap();
        assert!(!verify(&kid, b"goodbye", &sig).unwrap());
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let wallet = test_wallet();
        let alice = create_key(&wallet).unwrap();
        let bob = create_key(&wallet).unwrap();

        let (ciphertext, nonce) = seal(&wallet, &alice, &bob, b"for bob's eyes only").unwrap();
        let opened = open(&wallet, &bob, &alice, &ciphertext, &nonce).unwrap();
        assert_eq!(opened, b"for bob's eyes only");
    }

    #[test]
    fn test_open_with_wrong_sender_fails() {
        let wallet = test_wallet();
        let alice = create_key(&wallet).unwrap();
        let bob = create_key(&wallet).unwrap();
        let mallory = create_key(&wallet).unwrap();

        let (ciphertext, nonce) = seal(&wallet, &alice, &bob, b"secret").unwrap();
        assert!(open(&wallet, &bob, &mallory, &ciphertext, &nonce).is_err());
    }

    #[test]
    fn test_seal_anonymous_open_anonymous_roundtrip() {
        let wallet = test_wallet();
        let bob = create_key(&wallet).unwrap();

        let sealed = seal_anonymous(&bob, b"anonymous payload").unwrap();
        let opened = open_anonymous(&wallet, &bob, &sealed).unwrap();
        assert_eq!(opened, b"anonymous payload");
    }

    #[test]
    fn test_seal_anonymous_output_varies_per_call() {
        let wallet = test_wallet();
        let bob = create_key(&wallet).unwrap();

        let a = seal_anonymous(&bob, b"same plaintext").unwrap();
        let b = seal_anonymous(&bob, b"same plaintext").unwrap();
        assert_ne!(a, b);
    }
}
