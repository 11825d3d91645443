use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha2::{Sha256, Sha512};
use zeroize::Zeroize;

use crate::error::{Result, WalletError};

pub type HmacSha512 = Hmac<Sha512>;

const NONCE_LEN: usize = 24;
const PBKDF2_ITERATIONS: u32 = 100_000;

/// The fixed salt used by default — a known weakness; `WalletConfig` can
/// opt into a random per-wallet salt instead (see
/// [`crate::config::WalletConfig`]).
pub const DEFAULT_MASTER_SALT: &[u8] = b"saltsaltsaltsalt";

/// 32 bytes of key material, zeroized on drop.
///
/// Used for the master key, the metadata subkeys and every per-item content
/// key. Never implements `Clone` carelessly outside this module — callers
/// receive it by move or by reference.
#[derive(Debug)]
pub struct KeyMaterial(pub [u8; 32]);

impl KeyMaterial {
    #[allow(clippy::expect_used)]
    #[must_use]
    pub fn random() -> Self {
        let mut k = [0u8; 32];
        getrandom::fill(&mut k).expect("failed to get random bytes");
        Self(k)
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Clone for KeyMaterial {
    fn clone(&self) -> Self {
        Self(self.0)
    }
}

/// Derives the wallet master key from a passphrase via PBKDF2-HMAC-SHA512.
///
/// `salt` is `DEFAULT_MASTER_SALT` unless the wallet was opened with a
/// configured random salt. 100_000 iterations, 32-byte output.
#[must_use]
pub fn derive_master_key(passphrase: &str, salt: &[u8]) -> KeyMaterial {
    let mut out = [0u8; 32];
    pbkdf2_hmac::<Sha512>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut out);
    KeyMaterial(out)
}

/// Encrypts `plaintext` under `key` with a random nonce, returning
/// `nonce || ciphertext_with_tag`. No associated data.
pub fn encrypt(key: &KeyMaterial, plaintext: &[u8]) -> Result<Vec<u8>> {
    let aead = XChaCha20Poly1305::new((&key.0).into());
    let mut nonce = [0u8; NONCE_LEN];
    getrandom::fill(&mut nonce).map_err(|e| WalletError::CryptoFailure(e.to_string()))?;
    let ct = aead
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| WalletError::CryptoFailure("aead encrypt failed".into()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ct.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ct);
    Ok(out)
}

/// Decrypts data shaped `nonce || ciphertext_with_tag` as produced by
/// [`encrypt`] or [`encrypt_searchable`].
pub fn decrypt(key: &KeyMaterial, data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < NONCE_LEN {
        return Err(WalletError::EncodingFailure(
            "ciphertext shorter than nonce prefix".into(),
        ));
    }
    let (nonce, ct) = data.split_at(NONCE_LEN);
    let aead = XChaCha20Poly1305::new((&key.0).into());
    aead.decrypt(XNonce::from_slice(nonce), ct)
        .map_err(|_| WalletError::CryptoFailure("aead decrypt failed".into()))
}

/// Deterministic AEAD encryption used for searchable/lookup-stable storage
/// ids: the nonce is the first 24 bytes of HMAC-SHA512(`hmac_key`,
/// `plaintext`), so the same plaintext under the same `hmac_key` always
/// produces the same nonce (and hence ciphertext), letting the caller use
/// the ciphertext itself as a stable storage id. The full 64-byte HMAC is
/// computed even though only the first 24 bytes are used, for compatibility
/// with readers that expect the longer prefix (see
/// [`decrypt_searchable`]).
pub fn encrypt_searchable(hmac_key: &[u8; 64], key: &KeyMaterial, plaintext: &[u8]) -> Result<Vec<u8>> {
    let full = hmac_sha512_full(hmac_key, plaintext)?;
    let nonce = &full[..NONCE_LEN];

    let aead = XChaCha20Poly1305::new((&key.0).into());
    let ct = aead
        .encrypt(XNonce::from_slice(nonce), plaintext)
        .map_err(|_| WalletError::CryptoFailure("aead encrypt failed".into()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ct.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(&ct);
    Ok(out)
}

/// Decrypts data produced by [`encrypt_searchable`]. Some legacy writers in
/// the field prefixed the full 64-byte HMAC instead of the documented
/// 24-byte truncation; this tolerates both shapes by falling back to
/// treating the first 24 bytes of a 64-byte prefix as the nonce.
pub fn decrypt_searchable(key: &KeyMaterial, data: &[u8]) -> Result<Vec<u8>> {
    if let Ok(pt) = decrypt(key, data) {
        return Ok(pt);
    }
    if data.len() >= 64 {
        let (nonce, rest) = data.split_at(64);
        let aead = XChaCha20Poly1305::new((&key.0).into());
        if let Ok(pt) = aead.decrypt(XNonce::from_slice(&nonce[..NONCE_LEN]), rest) {
            return Ok(pt);
        }
    }
    Err(WalletError::CryptoFailure("aead decrypt failed".into()))
}

fn hmac_sha512_full(hmac_key: &[u8; 64], data: &[u8]) -> Result<[u8; 64]> {
    let mut mac =
        <HmacSha512 as Mac>::new_from_slice(hmac_key).map_err(|e| WalletError::CryptoFailure(e.to_string()))?;
    mac.update(data);
    let out = mac.finalize().into_bytes();
    let mut buf = [0u8; 64];
    buf.copy_from_slice(&out);
    Ok(buf)
}

/// HMAC-SHA256 helper used to compute short, non-searchable verification
/// tags (e.g. the metadata passphrase check).
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac =
        <Hmac<Sha256> as Mac>::new_from_slice(key).map_err(|e| WalletError::CryptoFailure(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
