//! Identity keypairs and envelope encryption for Crosstown.
//!
//! Two independent concerns live here: [`identity`] (secp256k1 keypairs,
//! BIP-340 Schnorr signatures, the canonical event-id hash) and [`envelope`]
//! (ECDH-derived authenticated symmetric encryption used for SPSP request/
//! response payloads). Neither module talks to the network or knows about
//! social events — those live in `crosstown-protocol`.

pub mod envelope;
pub mod error;
pub mod identity;

pub use error::CryptoError;
pub use identity::Identity;
