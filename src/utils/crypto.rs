// src/utils/crypto.rs
//! Cryptographic helpers shared by the key facade, the DID builder and the
//! resource service.
//!
//! - SHA-256 (resource checksums)
//! - base58 rendering of uncompressed secp256k1 public keys (key identifiers)

use k256::ecdsa::VerifyingKey;
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest, used as the `checksum` of a linked resource.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Uncompressed SEC1 encoding of a public key (`0x04 || x || y`, 65 bytes).
pub fn uncompressed_public_key(public_key: &VerifyingKey) -> Vec<u8> {
    public_key.to_encoded_point(false).as_bytes().to_vec()
}

/// Base58 rendering of the uncompressed public key.
///
/// This string doubles as the key identifier in the key store and as the
/// `publicKeyBase58` of the verification method built for the key, so the
/// same private key always lands on the same entry.
pub fn public_key_base58(public_key: &VerifyingKey) -> String {
    bs58::encode(uncompressed_public_key(public_key)).into_string()
}

/// Parses a base58 public key produced by [`public_key_base58`].
///
/// `None` for invalid base58 or bytes that are not a curve point.
pub fn public_key_from_base58(encoded: &str) -> Option<VerifyingKey> {
    let bytes = bs58::decode(encoded).into_vec().ok()?;
    VerifyingKey::from_sec1_bytes(&bytes).ok()
}
