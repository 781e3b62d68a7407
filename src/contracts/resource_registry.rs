// src/contracts/resource_registry.rs
//! Resource Registry smart contract interface.
//!
//! Linked resources are stored per owner address as JSON strings keyed by
//! resource id. The contract keeps insertion order, which is also creation
//! order.

use crate::blockchain::ledger_client::{FeeEstimate, LedgerClient, LedgerReceipt};
use crate::error::LedgerError;
use crate::models::did::Network;
use async_trait::async_trait;
use ethers::abi::{parse_abi, Abi, Token};
use ethers::types::Address;
use k256::ecdsa::SigningKey;
use once_cell::sync::Lazy;
use std::str::FromStr;
use std::sync::Arc;

static RESOURCE_REGISTRY_ABI: Lazy<Abi> = Lazy::new(|| {
    parse_abi(&[
        "function addResource(address _id, string _resourceId, string _resourcePayload)",
        "function updateResource(address _id, string _resourceId, string _resourcePayload)",
        "function getResource(address _id, string _resourceId) view returns (string)",
        "function getAllResources(address _id) view returns (string[])",
    ])
    .expect("Failed to load resource registry ABI")
});

/// Ledger operations behind the resource service.
#[async_trait]
pub trait ResourceRegistry: Send + Sync {
    /// Network whose identifiers own the resources stored here.
    fn network(&self) -> Network;

    /// Appends a resource under `owner`.
    async fn add_resource(
        &self,
        owner: Address,
        resource_id: &str,
        payload: &str,
        signing_key: &SigningKey,
    ) -> Result<Option<LedgerReceipt>, LedgerError>;

    /// Rewrites an existing resource in place (used to set `nextVersionId`).
    async fn update_resource(
        &self,
        owner: Address,
        resource_id: &str,
        payload: &str,
        signing_key: &SigningKey,
    ) -> Result<Option<LedgerReceipt>, LedgerError>;

    /// Raw payload, `None` when the id is unknown.
    async fn get_resource(
        &self,
        owner: Address,
        resource_id: &str,
    ) -> Result<Option<String>, LedgerError>;

    /// Every payload under `owner`, in insertion order.
    async fn get_all_resources(&self, owner: Address) -> Result<Vec<String>, LedgerError>;

    async fn estimate_fee(
        &self,
        method: &str,
        args: &[Token],
        from: Option<Address>,
    ) -> Result<FeeEstimate, LedgerError>;
}

/// Resource Registry smart contract wrapper.
#[derive(Clone, Debug)]
pub struct ResourceRegistryContract {
    client: Arc<LedgerClient>,
    address: Address,
    network: Network,
}

impl ResourceRegistryContract {
    /// Creates a new ResourceRegistryContract instance.
    ///
    /// # Arguments
    /// * `client` - Connected ledger client
    /// * `contract_address` - Hex string of the deployed registry address
    /// * `network` - Network segment of the identifiers owning resources here
    pub fn new(
        client: Arc<LedgerClient>,
        contract_address: &str,
        network: Network,
    ) -> Result<Self, LedgerError> {
        let address = Address::from_str(contract_address)
            .map_err(|e| LedgerError::InvalidAddress(format!("{}: {}", contract_address, e)))?;
        Ok(ResourceRegistryContract {
            client,
            address,
            network,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

#[async_trait]
impl ResourceRegistry for ResourceRegistryContract {
    fn network(&self) -> Network {
        self.network
    }

    async fn add_resource(
        &self,
        owner: Address,
        resource_id: &str,
        payload: &str,
        signing_key: &SigningKey,
    ) -> Result<Option<LedgerReceipt>, LedgerError> {
        self.client
            .send_transaction(
                self.address,
                &RESOURCE_REGISTRY_ABI,
                "addResource",
                (owner, resource_id.to_string(), payload.to_string()),
                signing_key,
            )
            .await
    }

    async fn update_resource(
        &self,
        owner: Address,
        resource_id: &str,
        payload: &str,
        signing_key: &SigningKey,
    ) -> Result<Option<LedgerReceipt>, LedgerError> {
        self.client
            .send_transaction(
                self.address,
                &RESOURCE_REGISTRY_ABI,
                "updateResource",
                (owner, resource_id.to_string(), payload.to_string()),
                signing_key,
            )
            .await
    }

    async fn get_resource(
        &self,
        owner: Address,
        resource_id: &str,
    ) -> Result<Option<String>, LedgerError> {
        let payload: String = self
            .client
            .query_contract(
                self.address,
                &RESOURCE_REGISTRY_ABI,
                "getResource",
                (owner, resource_id.to_string()),
            )
            .await?;

        Ok(Some(payload).filter(|p| !p.trim().is_empty()))
    }

    async fn get_all_resources(&self, owner: Address) -> Result<Vec<String>, LedgerError> {
        self.client
            .query_contract(self.address, &RESOURCE_REGISTRY_ABI, "getAllResources", (owner,))
            .await
    }

    async fn estimate_fee(
        &self,
        method: &str,
        args: &[Token],
        from: Option<Address>,
    ) -> Result<FeeEstimate, LedgerError> {
        self.client
            .estimate_fee(self.address, &RESOURCE_REGISTRY_ABI, method, args, from)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_all_resources_returns_string_array() {
        let function = RESOURCE_REGISTRY_ABI.function("getAllResources").unwrap();
        assert_eq!(function.outputs.len(), 1);
        assert_eq!(
            function.outputs[0].kind,
            ethers::abi::ParamType::Array(Box::new(ethers::abi::ParamType::String))
        );
        for method in ["addResource", "updateResource", "getResource"] {
            assert!(RESOURCE_REGISTRY_ABI.function(method).is_ok(), "{} missing", method);
        }
    }
}
