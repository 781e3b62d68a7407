// src/error.rs
//! Error types for the DID registrar.
//!
//! Errors are grouped by the collaborator that raised them:
//! - [`LedgerError`]: RPC transport, ABI encoding and transaction confirmation
//! - [`KeyStoreError`]: key material import and lookup
//! - [`RecordStoreError`]: local DID record persistence
//! - [`RegistrarError`]: everything the lifecycle and resource services can fail with
//!
//! The registrar folds these into a `failed` [`DidOperationResult`](crate::models::registration::DidOperationResult)
//! at its boundary, so they only escape from the lower-level services.

use crate::models::did::Network;
use ethers::types::H256;
use thiserror::Error;

/// A string that does not follow `did:<method>[:testnet]:0x<40 hex>`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid DID format: {0}")]
pub struct InvalidDid(pub String);

/// Failures raised while talking to the ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// JSON-RPC transport or node error
    #[error("Provider error: {0}")]
    Provider(#[from] ethers::providers::ProviderError),

    /// The contract ABI could not encode the call or decode the answer
    #[error("ABI error: {0}")]
    Abi(#[from] ethers::abi::Error),

    /// Signing or submission through the signer middleware failed
    #[error("Signer error: {0}")]
    Signer(String),

    /// The node dropped the transaction before it was mined
    #[error("Transaction was dropped before confirmation")]
    Dropped,

    /// The RPC endpoint could not be reached or parsed
    #[error("Ledger connection error: {0}")]
    Connection(String),

    /// The transaction was mined with a failing status (e.g. caller is not the controller)
    #[error("Transaction {0:?} reverted")]
    Reverted(H256),

    /// A contract address could not be parsed
    #[error("Invalid contract address: {0}")]
    InvalidAddress(String),

    /// The identifier belongs to a network this registry is not deployed on
    #[error("Identifier is on {found}, registry serves {expected}")]
    NetworkMismatch { expected: Network, found: Network },

    /// The contract returned data of an unexpected shape
    #[error("Unexpected contract response: {0}")]
    Decode(String),
}

/// Failures raised by a [`KeyStore`](crate::wallet::key_management::KeyStore).
#[derive(Error, Debug)]
pub enum KeyStoreError {
    #[error("Key store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),
}

/// Failures raised by a [`DidRecordStore`](crate::storage::record_store::DidRecordStore).
#[derive(Error, Debug)]
pub enum RecordStoreError {
    #[error("Record store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    #[error("DidRecord not found: {0}")]
    NotFound(String),
}

/// Top-level error for registrar and resource operations.
#[derive(Error, Debug)]
pub enum RegistrarError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    #[error(transparent)]
    RecordStore(#[from] RecordStoreError),

    #[error(transparent)]
    InvalidDid(#[from] InvalidDid),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Public Key not found")]
    PublicKeyNotFound,

    #[error("Key not found for publicKeyBase58: {0}")]
    SigningKeyNotFound(String),

    #[error("Unable to update did document")]
    UpdateRejected,

    #[error("Unable to deactivate did document for did : {0}")]
    DeactivateRejected(String),

    #[error("Resource {resource_id} not found for {did}")]
    ResourceNotFound { did: String, resource_id: String },

    #[error("Resource payload is invalid: {0}")]
    InvalidResource(String),
}

/// Convenience alias used across the services.
pub type RegistrarResult<T> = Result<T, RegistrarError>;
