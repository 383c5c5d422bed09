//! Identity keypairs over secp256k1 with BIP-340 Schnorr signatures.
//!
//! The host process owns identity keys; this module never persists a secret
//! key or generates one for production use. [`Identity::generate`] exists
//! purely for tests and local demos.

use secp256k1::{
    schnorr::Signature as SchnorrSignature, Keypair as Secp256k1Keypair, Message, Secp256k1,
    SecretKey, XOnlyPublicKey,
};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// 32 raw bytes — the host-supplied identity secret key.
pub type SecretBytes = [u8; 32];

/// A secp256k1 keypair with the x-only public key rendered as 64 lowercase
/// hex characters, matching the wire representation of a social event's
/// `pubkey` field.
#[derive(Clone)]
pub struct Identity {
    keypair: Secp256k1Keypair,
    pubkey_hex: String,
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("pubkey", &self.pubkey_hex)
            .finish_non_exhaustive()
    }
}

impl Identity {
    /// Load an identity from a host-supplied 32-byte secret key.
    pub fn from_secret_bytes(secret: &SecretBytes) -> Result<Self, CryptoError> {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(secret)
            .map_err(|e| CryptoError::InvalidSecretKey(e.to_string()))?;
        let keypair = Secp256k1Keypair::from_secret_key(&secp, &sk);
        let (xonly, _parity) = keypair.x_only_public_key();
        Ok(Self {
            keypair,
            pubkey_hex: hex::encode(xonly.serialize()),
        })
    }

    /// Generate a fresh identity. For tests and local demos only — production
    /// flows always receive keys from the host.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (sk, _pk) = secp.generate_keypair(&mut rand::rngs::OsRng);
        Self::from_secret_bytes(&sk.secret_bytes()).expect("freshly generated key is valid")
    }

    /// The 64-character lowercase hex x-only public key.
    pub fn pubkey_hex(&self) -> &str {
        &self.pubkey_hex
    }

    pub fn secret_key(&self) -> SecretKey {
        self.keypair.secret_key()
    }

    /// Sign a 32-byte message digest, producing a 64-byte BIP-340 signature.
    pub fn sign(&self, digest: &[u8; 32]) -> [u8; 64] {
        let secp = Secp256k1::new();
        let msg = Message::from_digest(*digest);
        let sig = secp.sign_schnorr_with_rng(&msg, &self.keypair, &mut rand::rngs::OsRng);
        sig.as_ref().try_into().expect("schnorr sig is 64 bytes")
    }
}

/// Parse a 64-character lowercase hex pubkey string into an `XOnlyPublicKey`.
pub fn parse_pubkey(pubkey_hex: &str) -> Result<XOnlyPublicKey, CryptoError> {
    if pubkey_hex.len() != 64 || !pubkey_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CryptoError::InvalidPublicKey(format!(
            "expected 64 lowercase hex chars, got {pubkey_hex:?}"
        )));
    }
    let bytes = hex::decode(pubkey_hex)
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    XOnlyPublicKey::from_slice(&bytes).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// Verify a BIP-340 Schnorr signature over a 32-byte digest.
pub fn verify(pubkey_hex: &str, digest: &[u8; 32], sig: &[u8; 64]) -> Result<(), CryptoError> {
    let secp = Secp256k1::new();
    let xonly = parse_pubkey(pubkey_hex)?;
    let signature =
        SchnorrSignature::from_slice(sig).map_err(|e| CryptoError::Signing(e.to_string()))?;
    let msg = Message::from_digest(*digest);
    secp.verify_schnorr(&signature, &msg, &xonly)
        .map_err(|_| CryptoError::InvalidSignature)
}

/// SHA-256, exposed here so callers never need to pull in `sha2` separately
/// for event-id hashing.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pubkey_is_64_lowercase_hex() {
        let id = Identity::generate();
        assert_eq!(id.pubkey_hex().len(), 64);
        assert!(id.pubkey_hex().bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(id.pubkey_hex(), &id.pubkey_hex().to_lowercase());
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let id = Identity::generate();
        let digest = sha256(b"hello world");
        let sig = id.sign(&digest);
        assert!(verify(id.pubkey_hex(), &digest, &sig).is_ok());
    }

    #[test]
    fn verify_rejects_tampered_digest() {
        let id = Identity::generate();
        let digest = sha256(b"hello world");
        let sig = id.sign(&digest);
        let other_digest = sha256(b"goodbye world");
        assert!(verify(id.pubkey_hex(), &other_digest, &sig).is_err());
    }

    #[test]
    fn verify_rejects_wrong_pubkey() {
        let id_a = Identity::generate();
        let id_b = Identity::generate();
        let digest = sha256(b"hello world");
        let sig = id_a.sign(&digest);
        assert!(verify(id_b.pubkey_hex(), &digest, &sig).is_err());
    }

    #[test]
    fn parse_pubkey_rejects_wrong_length() {
        assert!(parse_pubkey("deadbeef").is_err());
    }
}
