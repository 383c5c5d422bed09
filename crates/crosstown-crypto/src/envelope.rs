//! Versioned authenticated symmetric encryption between two identity
//! keypairs, used for the `content` field of SPSP request/response events.
//!
//! Key agreement is ECDH on secp256k1 between the sender's secret key and
//! the recipient's x-only public key. The shared point, together with a
//! fresh random nonce generated per call, is run through HKDF-SHA256 to
//! derive a ChaCha20 key and a separate HMAC-SHA256 authentication key —
//! the same two-key-derivation shape as the reference social protocol's
//! versioned encryption scheme. Binding the nonce into the HKDF `info`
//! parameter means every envelope between the same pair of identities uses
//! an independent keystream, not a replay of the static ECDH point.
//!
//! Wire format (before base64): `version(1) || nonce(12) || ciphertext || hmac_tag(32)`.
//! Decryption recomputes the HMAC over `version || nonce || ciphertext` and
//! compares in constant time before touching the ciphertext; on mismatch the
//! plaintext is never produced.
//!
//! Plaintext is padded to the next power-of-two bucket (minimum 32 bytes)
//! before encryption, with the real length carried in a 2-byte big-endian
//! prefix, for traffic-analysis resistance.

use base64::Engine;
use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use secp256k1::{PublicKey, Secp256k1, SecretKey, XOnlyPublicKey};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::CryptoError;
use crate::identity::parse_pubkey;

const VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 32;
const MIN_PADDED_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Encrypt `plaintext` from `sender_secret` to `recipient_pubkey_hex`.
///
/// Returns the base64-encoded envelope string suitable for an event's
/// `content` field.
pub fn encrypt(
    plaintext: &[u8],
    sender_secret: &SecretKey,
    recipient_pubkey_hex: &str,
) -> Result<String, CryptoError> {
    let recipient = parse_pubkey(recipient_pubkey_hex)?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    let (enc_key, mac_key) = derive_keys(sender_secret, &recipient, &nonce)?;

    let padded = pad(plaintext);
    let mut ciphertext = padded;
    let mut cipher = ChaCha20::new(&enc_key.into(), &nonce.into());
    cipher.apply_keystream(&mut ciphertext);

    let mut mac = <HmacSha256 as Mac>::new_from_slice(&mac_key)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    mac.update(&[VERSION]);
    mac.update(&nonce);
    mac.update(&ciphertext);
    let tag = mac.finalize().into_bytes();

    let mut out = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len() + TAG_LEN);
    out.push(VERSION);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    out.extend_from_slice(&tag);
    Ok(base64::engine::general_purpose::STANDARD.encode(out))
}

/// Decrypt an envelope produced by [`encrypt`], addressed to `recipient_secret`
/// and claiming to originate from `sender_pubkey_hex`.
///
/// Fails closed on HMAC mismatch: the plaintext buffer is never touched when
/// authentication fails.
pub fn decrypt(
    ciphertext_b64: &str,
    recipient_secret: &SecretKey,
    sender_pubkey_hex: &str,
) -> Result<Vec<u8>, CryptoError> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(ciphertext_b64)
        .map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))?;

    if raw.len() < 1 + NONCE_LEN + TAG_LEN {
        return Err(CryptoError::MalformedEnvelope("envelope too short".into()));
    }
    let version = raw[0];
    if version != VERSION {
        return Err(CryptoError::UnsupportedVersion(version));
    }
    let nonce_start = 1;
    let nonce_end = nonce_start + NONCE_LEN;
    let tag_start = raw.len() - TAG_LEN;
    let nonce: [u8; NONCE_LEN] = raw[nonce_start..nonce_end]
        .try_into()
        .map_err(|_| CryptoError::MalformedEnvelope("bad nonce length".into()))?;
    let ciphertext = &raw[nonce_end..tag_start];
    let tag = &raw[tag_start..];

    let sender = parse_pubkey(sender_pubkey_hex)?;
    let (enc_key, mac_key) = derive_keys(recipient_secret, &sender, &nonce)?;

    let mut mac = <HmacSha256 as Mac>::new_from_slice(&mac_key)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    mac.update(&[version]);
    mac.update(&nonce);
    mac.update(ciphertext);
    let computed_tag = mac.finalize().into_bytes();

    if computed_tag.ct_eq(tag).unwrap_u8() != 1 {
        return Err(CryptoError::DecryptionFailed);
    }

    let mut buf = ciphertext.to_vec();
    let mut cipher = ChaCha20::new(&enc_key.into(), &nonce.into());
    cipher.apply_keystream(&mut buf);

    unpad(&buf)
}

/// ECDH between `secret` and `their_xonly`, then HKDF-SHA256 expansion —
/// with `nonce` folded into the `info` parameter — into a 32-byte ChaCha20
/// key and a 32-byte HMAC key. Binding the per-call random `nonce` into the
/// derivation (rather than deriving it from the static ECDH point) is what
/// gives each envelope between the same pair of identities an independent
/// keystream.
fn derive_keys(
    secret: &SecretKey,
    their_xonly: &XOnlyPublicKey,
    nonce: &[u8; NONCE_LEN],
) -> Result<([u8; 32], [u8; 32]), CryptoError> {
    let their_full = their_xonly.public_key(secp256k1::Parity::Even);
    let shared = ecdh_shared_x(secret, &their_full)?;

    let hk = Hkdf::<Sha256>::new(None, &shared);
    let mut info = Vec::with_capacity(21 + NONCE_LEN);
    info.extend_from_slice(b"crosstown-envelope-v1");
    info.extend_from_slice(nonce);

    let mut okm = [0u8; 32 + 32];
    hk.expand(&info, &mut okm)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;

    let mut enc_key = [0u8; 32];
    let mut mac_key = [0u8; 32];
    enc_key.copy_from_slice(&okm[0..32]);
    mac_key.copy_from_slice(&okm[32..64]);
    Ok((enc_key, mac_key))
}

/// Raw x-coordinate of the ECDH shared point, computed with the secp256k1
/// library's constant-time scalar multiplication.
fn ecdh_shared_x(secret: &SecretKey, their_pubkey: &PublicKey) -> Result<[u8; 32], CryptoError> {
    let shared = secp256k1::ecdh::shared_secret_point(their_pubkey, secret);
    let mut x = [0u8; 32];
    x.copy_from_slice(&shared[0..32]);
    Ok(x)
}

/// Pad `plaintext` to the next power-of-two bucket (minimum 32 bytes),
/// prefixed with a 2-byte big-endian real-length marker.
fn pad(plaintext: &[u8]) -> Vec<u8> {
    let real_len = plaintext.len() as u16;
    let needed = 2 + plaintext.len();
    let mut bucket = MIN_PADDED_LEN;
    while bucket < needed {
        bucket *= 2;
    }
    let mut out = Vec::with_capacity(bucket);
    out.extend_from_slice(&real_len.to_be_bytes());
    out.extend_from_slice(plaintext);
    out.resize(bucket, 0);
    out
}

fn unpad(buf: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if buf.len() < 2 {
        return Err(CryptoError::MalformedEnvelope("padded buffer too short".into()));
    }
    let real_len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    if 2 + real_len > buf.len() {
        return Err(CryptoError::MalformedEnvelope(
            "declared length exceeds buffer".into(),
        ));
    }
    Ok(buf[2..2 + real_len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    #[test]
    fn roundtrip() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let msg = b"hello bob, this is alice";

        let ct = encrypt(msg, &alice.secret_key(), bob.pubkey_hex()).unwrap();
        let pt = decrypt(&ct, &bob.secret_key(), alice.pubkey_hex()).unwrap();
        assert_eq!(pt, msg);
    }

    #[test]
    fn roundtrip_empty_plaintext() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let ct = encrypt(b"", &alice.secret_key(), bob.pubkey_hex()).unwrap();
        let pt = decrypt(&ct, &bob.secret_key(), alice.pubkey_hex()).unwrap();
        assert_eq!(pt, b"");
    }

    #[test]
    fn wrong_recipient_fails_closed() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let mallory = Identity::generate();
        let ct = encrypt(b"secret", &alice.secret_key(), bob.pubkey_hex()).unwrap();
        let result = decrypt(&ct, &mallory.secret_key(), alice.pubkey_hex());
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn tampered_ciphertext_fails_closed() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let ct = encrypt(b"secret payload", &alice.secret_key(), bob.pubkey_hex()).unwrap();
        let mut raw = base64::engine::general_purpose::STANDARD
            .decode(&ct)
            .unwrap();
        let mid = raw.len() / 2;
        raw[mid] ^= 0xff;
        let tampered = base64::engine::general_purpose::STANDARD.encode(raw);
        let result = decrypt(&tampered, &bob.secret_key(), alice.pubkey_hex());
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn padded_length_hides_exact_size() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let short = encrypt(b"hi", &alice.secret_key(), bob.pubkey_hex()).unwrap();
        let longer = encrypt(b"hi!", &alice.secret_key(), bob.pubkey_hex()).unwrap();
        // Both fall in the same minimum padding bucket.
        assert_eq!(short.len(), longer.len());
    }

    #[test]
    fn repeated_encryptions_use_independent_keystreams() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let msg = b"same message, sent twice";

        let ct1 = encrypt(msg, &alice.secret_key(), bob.pubkey_hex()).unwrap();
        let ct2 = encrypt(msg, &alice.secret_key(), bob.pubkey_hex()).unwrap();
        // A fresh nonce per call means identical plaintexts never produce
        // identical envelopes, so XOR-ing two captured ciphertexts can't
        // recover the plaintext XOR (the two-time-pad attack).
        assert_ne!(ct1, ct2);

        assert_eq!(decrypt(&ct1, &bob.secret_key(), alice.pubkey_hex()).unwrap(), msg);
        assert_eq!(decrypt(&ct2, &bob.secret_key(), alice.pubkey_hex()).unwrap(), msg);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let ct = encrypt(b"secret", &alice.secret_key(), bob.pubkey_hex()).unwrap();
        let mut raw = base64::engine::general_purpose::STANDARD
            .decode(&ct)
            .unwrap();
        raw[0] = 9;
        let bumped = base64::engine::general_purpose::STANDARD.encode(raw);
        let result = decrypt(&bumped, &bob.secret_key(), alice.pubkey_hex());
        assert!(matches!(result, Err(CryptoError::UnsupportedVersion(9))));
    }
}
