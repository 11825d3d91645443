#![allow(clippy::unwrap_used)]

use sigil_envelope::{pack, unpack, EnvelopeError};
use sigil_wallet::keys::create_key;
use sigil_wallet::{StorageConfig, Wallet, WalletConfig};

fn open_wallet(passphrase: &str) -> Wallet {
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
fn round_trip_authcrypt_between_two_wallets() {
    let alice = open_wallet("alice-passphrase");
    let bob = open_wallet("bob-passphrase");

    let alice_kid = create_key(&alice).unwrap();
    let bob_kid = create_key(&bob).unwrap();

    let envelope = pack(&alice, Some(&alice_kid), &[bob_kid], b"oh hey there!").unwrap();
    let (plaintext, sender) = unpack(&bob, &envelope).unwrap();

    assert_eq!(plaintext, b"oh hey there!");
    assert_eq!(sender.as_deref(), Some(alice_kid.as_str()));
}

#[test]
fn round_trip_anoncrypt_to_self() {
    let alice = open_wallet("alice-passphrase");
    let alice_kid = create_key(&alice).unwrap();

    let envelope = pack(&alice, None, &[alice_kid], b"oh hey there!").unwrap();
    let (plaintext, sender) = unpack(&alice, &envelope).unwrap();

    assert_eq!(plaintext, b"oh hey there!");
    assert_eq!(sender, None);
}

#[test]
fn unpacking_with_wrong_recipient_wallet_fails() {
    let alice = open_wallet("alice-passphrase");
    let bob = open_wallet("bob-passphrase");

    let alice_kid = create_key(&alice).unwrap();
    let _bob_kid = create_key(&bob).unwrap();

    // Pack for Alice's own key, then try to unpack with Bob's wallet, which
    // holds no matching private key.
    let envelope = pack(&alice, Some(&alice_kid), &[alice_kid.clone()], b"for alice only").unwrap();
    let result = unpack(&bob, &envelope);

    assert!(matches!(result, Err(EnvelopeError::NoMatchingRecipient)));
}

#[test]
fn tampering_with_protected_header_breaks_unpack() {
    let alice = open_wallet("alice-passphrase");
    let bob = open_wallet("bob-passphrase");

    let alice_kid = create_key(&alice).unwrap();
    let bob_kid = create_key(&bob).unwrap();

    let mut envelope = pack(&alice, Some(&alice_kid), &[bob_kid], b"tamper me").unwrap();
    // Flip a character in the protected header; this invalidates the AD used
    // for the message AEAD even if the header still parses as valid JSON.
    let mut bytes = envelope.protected.into_bytes();
    let last = bytes.len() - 1;
    bytes[last] = if bytes[last] == b'A' { b'B' } else { b'A' };
    envelope.protected = String::from_utf8(bytes).unwrap();

    assert!(unpack(&bob, &envelope).is_err());
}
