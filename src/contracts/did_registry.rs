// src/contracts/did_registry.rs
//! DID Registry smart contract interface implementation.
//!
//! Provides an abstraction layer for the registry contract that anchors DID
//! documents. Each document is stored as a JSON string keyed by the account
//! address embedded in the DID. The contract enforces that only the registered
//! controller may overwrite a document; this module never checks ownership
//! itself and surfaces a revert as [`LedgerError::Reverted`].

use crate::blockchain::ledger_client::{FeeEstimate, LedgerClient, LedgerReceipt};
use crate::error::LedgerError;
use crate::models::did::{Did, DidDocument, Network};
use crate::utils::serialization::{deserialize, serialize};
use async_trait::async_trait;
use ethers::abi::{parse_abi, Abi, Token};
use ethers::types::{Address, H256, U256};
use k256::ecdsa::SigningKey;
use log::info;
use once_cell::sync::Lazy;
use std::str::FromStr;
use std::sync::Arc;

static DID_REGISTRY_ABI: Lazy<Abi> = Lazy::new(|| {
    parse_abi(&[
        "function createDID(address _id, string _doc) returns (address, string)",
        "function updateDIDDoc(address _id, string _doc) returns (address, string)",
        "function getDIDDoc(address _id) view returns (string)",
        "function transferOwnership(address _newOwner) returns (string)",
        "function getOwner() view returns (address)",
    ])
    .expect("Failed to load DID registry ABI")
});

/// A confirmed document write.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerWrite {
    /// Hash of the mined transaction
    pub txn_hash: H256,
    /// Document as written to the ledger
    pub did_doc: DidDocument,
}

/// Ledger operations the registrar needs for DID documents.
///
/// Implementations block until the transaction is mined. None of them retry.
#[async_trait]
pub trait DidLedger: Send + Sync {
    /// Network whose identifiers this ledger anchors.
    fn network(&self) -> Network;

    /// Native balance of an account.
    async fn balance(&self, address: Address) -> Result<U256, LedgerError>;

    /// Anchors a new document for `did`, signed by `signing_key`.
    async fn create(
        &self,
        did: &Did,
        document: &DidDocument,
        signing_key: &SigningKey,
    ) -> Result<LedgerWrite, LedgerError>;

    /// Overwrites the document for `did`.
    ///
    /// Returns `Ok(None)` when the ledger gave no confirmation for the write.
    async fn update(
        &self,
        did: &Did,
        document: &DidDocument,
        signing_key: &SigningKey,
    ) -> Result<Option<LedgerWrite>, LedgerError>;

    /// Currently anchored document, `None` if nothing was ever written.
    async fn get_document(&self, did: &Did) -> Result<Option<DidDocument>, LedgerError>;

    /// Dry-run cost of a registry method.
    async fn estimate_fee(
        &self,
        method: &str,
        args: &[Token],
        from: Option<Address>,
    ) -> Result<FeeEstimate, LedgerError>;
}

/// DID Registry smart contract wrapper.
///
/// This struct provides high-level methods to interact with the DID Registry contract:
/// - DID creation
/// - DID resolution
/// - DID updates (and deactivation, which is an update to a stub document)
/// - Registry ownership
#[derive(Clone, Debug)]
pub struct DidRegistryContract {
    /// Shared ledger client
    client: Arc<LedgerClient>,
    /// Address of the deployed registry
    address: Address,
    /// Network the registry is deployed on; identifiers of other networks are rejected
    network: Network,
}

impl DidRegistryContract {
    /// Creates a new DidRegistryContract instance.
    ///
    /// # Arguments
    /// * `client` - Connected ledger client
    /// * `contract_address` - Hex string of the deployed registry address
    /// * `network` - Network segment of the identifiers anchored here
    pub fn new(
        client: Arc<LedgerClient>,
        contract_address: &str,
        network: Network,
    ) -> Result<Self, LedgerError> {
        let address = Address::from_str(contract_address)
            .map_err(|e| LedgerError::InvalidAddress(format!("{}: {}", contract_address, e)))?;
        Ok(DidRegistryContract {
            client,
            address,
            network,
        })
    }

    fn ensure_network(&self, did: &Did) -> Result<(), LedgerError> {
        if did.network == self.network {
            Ok(())
        } else {
            Err(LedgerError::NetworkMismatch {
                expected: self.network,
                found: did.network,
            })
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Current owner of the registry contract.
    pub async fn owner(&self) -> Result<Address, LedgerError> {
        self.client
            .query_contract(self.address, &DID_REGISTRY_ABI, "getOwner", ())
            .await
    }

    /// Hands registry ownership to `new_owner`. Only the current owner may call this.
    pub async fn transfer_ownership(
        &self,
        new_owner: Address,
        signing_key: &SigningKey,
    ) -> Result<Option<LedgerReceipt>, LedgerError> {
        self.client
            .send_transaction(
                self.address,
                &DID_REGISTRY_ABI,
                "transferOwnership",
                (new_owner,),
                signing_key,
            )
            .await
    }

    async fn write_document(
        &self,
        method: &str,
        did: &Did,
        document: &DidDocument,
        signing_key: &SigningKey,
    ) -> Result<Option<LedgerWrite>, LedgerError> {
        let document_json =
            serialize(document).map_err(|e| LedgerError::Decode(e.to_string()))?;

        let receipt = self
            .client
            .send_transaction(
                self.address,
                &DID_REGISTRY_ABI,
                method,
                (did.address, document_json),
                signing_key,
            )
            .await?;

        Ok(receipt.map(|receipt| LedgerWrite {
            txn_hash: receipt.txn_hash,
            did_doc: document.clone(),
        }))
    }
}

#[async_trait]
impl DidLedger for DidRegistryContract {
    fn network(&self) -> Network {
        self.network
    }

    async fn balance(&self, address: Address) -> Result<U256, LedgerError> {
        self.client.get_balance(address).await
    }

    async fn create(
        &self,
        did: &Did,
        document: &DidDocument,
        signing_key: &SigningKey,
    ) -> Result<LedgerWrite, LedgerError> {
        self.ensure_network(did)?;
        info!("Submitting createDID for {}", did);
        self.write_document("createDID", did, document, signing_key)
            .await?
            .ok_or(LedgerError::Dropped)
    }

    async fn update(
        &self,
        did: &Did,
        document: &DidDocument,
        signing_key: &SigningKey,
    ) -> Result<Option<LedgerWrite>, LedgerError> {
        self.ensure_network(did)?;
        info!("Submitting updateDIDDoc for {}", did);
        self.write_document("updateDIDDoc", did, document, signing_key)
            .await
    }

    async fn get_document(&self, did: &Did) -> Result<Option<DidDocument>, LedgerError> {
        if did.network != self.network {
            return Ok(None);
        }
        let document_json: String = self
            .client
            .query_contract(self.address, &DID_REGISTRY_ABI, "getDIDDoc", (did.address,))
            .await?;

        if document_json.trim().is_empty() {
            return Ok(None);
        }

        deserialize(&document_json)
            .map(Some)
            .map_err(|e| LedgerError::Decode(e.to_string()))
    }

    async fn estimate_fee(
        &self,
        method: &str,
        args: &[Token],
        from: Option<Address>,
    ) -> Result<FeeEstimate, LedgerError> {
        self.client
            .estimate_fee(self.address, &DID_REGISTRY_ABI, method, args, from)
            .await
    }
}
