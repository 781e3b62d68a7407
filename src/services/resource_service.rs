// src/services/resource_service.rs
//! Linked resource service.
//!
//! Resources are versioned artifacts (schemas, credential definitions, ...)
//! published under the account of a DID. Versions of one logical resource form
//! a series, identified by `resourceName` + `resourceType`, and are chained
//! through `previousVersionId` / `nextVersionId`.
//!
//! A new version is written first, already pointing back at its predecessor,
//! and only then is the predecessor rewritten to point forward. A reader can
//! therefore never observe a new version without its back link. Forward links
//! that could not be written are repaired by the next addition to the series.

use crate::blockchain::ledger_client::FeeEstimate;
use crate::contracts::resource_registry::ResourceRegistry;
use crate::error::{LedgerError, RegistrarError, RegistrarResult};
use crate::models::did::Did;
use crate::models::resource::{AddedResource, LinkedResource, ResourcePayload};
use crate::utils::crypto::sha256_hex;
use crate::utils::serialization::{deserialize, serialize};
use crate::wallet::key_management::KeyManager;
use chrono::{SecondsFormat, Utc};
use ethers::abi::Token;
use ethers::types::Address;
use ethers::utils::to_checksum;
use k256::ecdsa::SigningKey;
use log::{debug, info, warn};
use std::sync::Arc;
use uuid::Uuid;

/// Service for adding and reading linked resources.
#[derive(Clone)]
pub struct ResourceLedgerService {
    registry: Arc<dyn ResourceRegistry>,
    keys: KeyManager,
}

impl ResourceLedgerService {
    pub fn new(registry: Arc<dyn ResourceRegistry>, keys: KeyManager) -> Self {
        ResourceLedgerService { registry, keys }
    }

    /// Publishes a new resource version under `did`.
    ///
    /// # Arguments
    /// * `did` - Identifier whose account owns the resource
    /// * `key_id` - Key identifier of the signing key (the DID's controlling key)
    /// * `payload` - Resource name, type, media type and content
    ///
    /// # Process Flow
    /// 1. Collects the existing versions of the same series, oldest first
    /// 2. Writes the new resource with `previousVersionId` set to the newest
    /// 3. Rewrites every version whose `nextVersionId` is not its successor
    ///
    /// A failed rewrite in step 3 does not fail the call: the new resource is
    /// already anchored, so it is returned with the affected ids listed in
    /// [`AddedResource::unlinked_version_ids`].
    ///
    /// # Errors
    /// - [`RegistrarError::InvalidResource`] for an empty name or type
    /// - [`RegistrarError::SigningKeyNotFound`] if `key_id` is unknown
    /// - [`LedgerError::NetworkMismatch`] for an identifier of another network
    /// - Ledger errors from the resource write, including a revert when the key
    ///   does not control the account
    pub async fn add_resource(
        &self,
        did: &str,
        key_id: &str,
        payload: ResourcePayload,
    ) -> RegistrarResult<AddedResource> {
        let parsed: Did = did.parse()?;
        if payload.resource_name.trim().is_empty() {
            return Err(RegistrarError::InvalidResource("resourceName is required".into()));
        }
        if payload.resource_type.trim().is_empty() {
            return Err(RegistrarError::InvalidResource("resourceType is required".into()));
        }

        let signing_key = self
            .keys
            .signing_key(key_id)
            .await?
            .ok_or_else(|| RegistrarError::SigningKeyNotFound(key_id.to_string()))?;

        if parsed.network != self.registry.network() {
            return Err(LedgerError::NetworkMismatch {
                expected: self.registry.network(),
                found: parsed.network,
            }
            .into());
        }

        let series: Vec<LinkedResource> = self
            .resources_of(&parsed)
            .await?
            .into_iter()
            .filter(|r| r.same_series(&payload.resource_name, &payload.resource_type))
            .collect();

        let resource_id = Uuid::new_v4().to_string();
        let resource = LinkedResource {
            resource_uri: format!("{}/resources/{}", did, resource_id),
            resource_collection_id: to_checksum(&parsed.address, None),
            resource_id: resource_id.clone(),
            resource_name: payload.resource_name,
            resource_type: payload.resource_type,
            media_type: payload.media_type,
            created: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            checksum: sha256_hex(&serde_json::to_vec(&payload.content)?),
            previous_version_id: series.last().map(|p| p.resource_id.clone()),
            next_version_id: None,
        };

        let receipt = self
            .registry
            .add_resource(
                parsed.address,
                &resource_id,
                &serialize(&resource)?,
                &signing_key,
            )
            .await?
            .ok_or(LedgerError::Dropped)?;
        info!("Added resource {} for {} in {:?}", resource_id, did, receipt.txn_hash);

        // Each member of the series points at the member created after it, the
        // newest one at the resource just written. A link missed by an earlier
        // call is rewritten here as well.
        let successors = series
            .iter()
            .skip(1)
            .map(|r| r.resource_id.clone())
            .chain(std::iter::once(resource_id.clone()))
            .collect::<Vec<_>>();

        let mut unlinked_version_ids = Vec::new();
        for (member, next_id) in series.into_iter().zip(successors) {
            if member.next_version_id.as_deref() == Some(next_id.as_str()) {
                continue;
            }
            let member_id = member.resource_id.clone();
            if let Err(e) = self.link(parsed.address, member, next_id, &signing_key).await {
                warn!("Could not set nextVersionId of {}: {}", member_id, e);
                unlinked_version_ids.push(member_id);
            }
        }

        Ok(AddedResource {
            resource_id,
            txn_hash: receipt.txn_hash,
            resource,
            unlinked_version_ids,
        })
    }

    /// A single resource of `did`.
    pub async fn get_resource_by_did_and_id(
        &self,
        did: &str,
        resource_id: &str,
    ) -> RegistrarResult<LinkedResource> {
        let parsed: Did = did.parse()?;
        let not_found = || RegistrarError::ResourceNotFound {
            did: did.to_string(),
            resource_id: resource_id.to_string(),
        };
        if parsed.network != self.registry.network() {
            return Err(not_found());
        }

        let payload = self
            .registry
            .get_resource(parsed.address, resource_id)
            .await?
            .filter(|payload| !payload.trim().is_empty())
            .ok_or_else(not_found)?;

        let resource: LinkedResource = deserialize(&payload)?;
        if !Self::owned_by(&resource, &parsed) {
            return Err(not_found());
        }
        Ok(resource)
    }

    /// Every resource of `did`, oldest first.
    pub async fn get_all_resources_by_did(&self, did: &str) -> RegistrarResult<Vec<LinkedResource>> {
        let parsed: Did = did.parse()?;
        self.resources_of(&parsed).await
    }

    /// Dry-run cost of a resource registry call.
    pub async fn estimate_fee(&self, method: &str, args: &[Token]) -> RegistrarResult<FeeEstimate> {
        let from = args.first().and_then(|token| token.clone().into_address());
        Ok(self.registry.estimate_fee(method, args, from).await?)
    }

    async fn link(
        &self,
        owner: Address,
        mut member: LinkedResource,
        next_id: String,
        signing_key: &SigningKey,
    ) -> RegistrarResult<()> {
        debug!("Linking {} -> {}", member.resource_id, next_id);
        member.next_version_id = Some(next_id);
        self.registry
            .update_resource(owner, &member.resource_id, &serialize(&member)?, signing_key)
            .await?
            .ok_or(LedgerError::Dropped)?;
        Ok(())
    }

    fn owned_by(resource: &LinkedResource, did: &Did) -> bool {
        resource
            .owner_did()
            .and_then(|owner| owner.parse::<Did>().ok())
            .as_ref()
            == Some(did)
    }

    /// Resources whose `resourceURI` names `did`, oldest first. Resources of a
    /// sibling identifier on another network are excluded even though they
    /// share the account.
    async fn resources_of(&self, did: &Did) -> RegistrarResult<Vec<LinkedResource>> {
        if did.network != self.registry.network() {
            return Ok(Vec::new());
        }

        let mut resources = self
            .registry
            .get_all_resources(did.address)
            .await?
            .iter()
            .filter(|payload| !payload.trim().is_empty())
            .map(|payload| deserialize::<LinkedResource>(payload))
            .collect::<Result<Vec<_>, _>>()?;

        resources.retain(|resource| Self::owned_by(resource, did));
        resources.sort_by(|a, b| a.created.cmp(&b.created));
        Ok(resources)
    }
}
