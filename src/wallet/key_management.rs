// src/wallet/key_management.rs
//! Signing key management for the DID registrar.
//!
//! Private keys handed to the registrar are imported into a [`KeyStore`] under a
//! deterministic key identifier: the base58 encoding of the uncompressed
//! secp256k1 public key. Importing the same private key twice therefore always
//! resolves to the same entry.
//!
//! Uses the following cryptographic primitives:
//! - secp256k1 curve (via `k256` crate)
//! - Keccak-256 address derivation (via `ethers` crate)

use crate::error::KeyStoreError;
use crate::utils::crypto::public_key_base58;
use async_trait::async_trait;
use ethers::types::Address;
use ethers::utils::secret_key_to_address;
use k256::ecdsa::{SigningKey, VerifyingKey};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Storage for private signing material.
///
/// # Contract
/// `import_key` must be insert-if-absent: when `key_id` already has an entry the
/// existing key is kept and its public key returned. This single conditional
/// write is what makes concurrent imports of the same key safe without a lock
/// in the caller.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Public key stored under `key_id`, if any.
    async fn public_key(&self, key_id: &str) -> Result<Option<VerifyingKey>, KeyStoreError>;

    /// Stores `secret` under `key_id` unless an entry already exists.
    async fn import_key(
        &self,
        key_id: &str,
        secret: SigningKey,
    ) -> Result<VerifyingKey, KeyStoreError>;

    /// Private key stored under `key_id`, used to sign ledger writes.
    async fn signing_key(&self, key_id: &str) -> Result<Option<SigningKey>, KeyStoreError>;
}

/// In-memory key store.
///
/// Thread-safe through a mutex. Keys live only as long as the process.
#[derive(Default)]
pub struct InMemoryKeyStore {
    /// Private keys by key identifier
    keys: Mutex<HashMap<String, SigningKey>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.keys.lock().map(|keys| keys.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SigningKey>>, KeyStoreError> {
        self.keys
            .lock()
            .map_err(|e| KeyStoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn public_key(&self, key_id: &str) -> Result<Option<VerifyingKey>, KeyStoreError> {
        Ok(self.lock()?.get(key_id).map(|key| key.verifying_key().clone()))
    }

    async fn import_key(
        &self,
        key_id: &str,
        secret: SigningKey,
    ) -> Result<VerifyingKey, KeyStoreError> {
        let mut keys = self.lock()?;
        let stored = keys.entry(key_id.to_string()).or_insert(secret);
        Ok(stored.verifying_key().clone())
    }

    async fn signing_key(&self, key_id: &str) -> Result<Option<SigningKey>, KeyStoreError> {
        Ok(self.lock()?.get(key_id).cloned())
    }
}

/// Parses a raw 32-byte secp256k1 private key.
///
/// # Errors
/// [`KeyStoreError::InvalidPrivateKey`] for wrong length, zero, or out-of-range scalars.
pub fn parse_private_key(bytes: &[u8]) -> Result<SigningKey, KeyStoreError> {
    if bytes.len() != 32 {
        return Err(KeyStoreError::InvalidPrivateKey(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    SigningKey::from_slice(bytes).map_err(|e| KeyStoreError::InvalidPrivateKey(e.to_string()))
}

/// Parses a hex private key, with or without `0x` prefix.
pub fn parse_private_key_hex(private_key: &str) -> Result<SigningKey, KeyStoreError> {
    let bytes = hex::decode(private_key.trim_start_matches("0x"))
        .map_err(|e| KeyStoreError::InvalidPrivateKey(e.to_string()))?;
    parse_private_key(&bytes)
}

/// Result of [`KeyManager::import_or_lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedKey {
    /// base58 public key, also the `publicKeyBase58` of verification methods
    pub key_id: String,
    pub public_key: VerifyingKey,
    /// Ethereum address of the key
    pub address: Address,
}

/// Facade over a [`KeyStore`] that derives key identifiers.
#[derive(Clone)]
pub struct KeyManager {
    store: Arc<dyn KeyStore>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        KeyManager { store }
    }

    /// Key identifier of a private key: base58 of its uncompressed public key.
    pub fn key_id(private_key: &SigningKey) -> String {
        public_key_base58(private_key.verifying_key())
    }

    /// Ethereum address controlled by a private key.
    pub fn address(private_key: &SigningKey) -> Address {
        secret_key_to_address(private_key)
    }

    /// Imports `private_key` unless it is already stored.
    ///
    /// # Process Flow
    /// 1. Derives the key identifier from the public key
    /// 2. Looks the identifier up in the store
    /// 3. Returns the stored public key unchanged if present, otherwise imports
    ///
    /// # Errors
    /// Propagates [`KeyStoreError::Unavailable`] from the store.
    pub async fn import_or_lookup(&self, private_key: &SigningKey) -> Result<ImportedKey, KeyStoreError> {
        let key_id = Self::key_id(private_key);

        let public_key = match self.store.public_key(&key_id).await? {
            Some(existing) => {
                debug!("Key already exists in key store: {}", key_id);
                existing
            }
            None => {
                let imported = self.store.import_key(&key_id, private_key.clone()).await?;
                debug!("Imported new key to key store: {}", key_id);
                imported
            }
        };

        Ok(ImportedKey {
            address: Self::address(private_key),
            key_id,
            public_key,
        })
    }

    /// Private key stored under `key_id`.
    pub async fn signing_key(&self, key_id: &str) -> Result<Option<SigningKey>, KeyStoreError> {
        self.store.signing_key(key_id).await
    }
}
