// src/services/registrar.rs
//! DID lifecycle registrar.
//!
//! Coordinates the key store, the registry contract, the resolver and the
//! local record store to create, update and deactivate identifiers.
//!
//! Every lifecycle call ends in a [`DidOperationResult`]: `finished` with the
//! confirmed document and transaction hash, or `failed` with a reason. Expected
//! business failures (no funds, unknown DID, bad input) are reported with a
//! fixed reason string before any ledger write. Anything else raised along the
//! way is folded into `unknownError: <message>` at the operation boundary, so
//! no error escapes to the caller.
//!
//! At most one ledger write is attempted per call and nothing is retried.

use crate::blockchain::ledger_client::FeeEstimate;
use crate::contracts::did_registry::DidLedger;
use crate::did::builder::{append_verification_method, build_document};
use crate::did::resolver::{DidResolution, DidResolver};
use crate::did::validator::validate;
use crate::error::{RegistrarError, RegistrarResult};
use crate::models::did::{Did, DidDocument, Network, DEFAULT_DID_METHOD};
use crate::models::registration::DidOperationResult;
use crate::storage::record_store::{DidRecord, DidRecordStore};
use crate::wallet::key_management::{parse_private_key, KeyManager};
use ethers::abi::Token;
use k256::ecdsa::SigningKey;
use log::{error, info, warn};
use std::sync::Arc;

pub const ERROR_INSUFFICIENT_BALANCE: &str = "Insufficient balance in wallet";
pub const ERROR_DID_NOT_FOUND: &str = "Did not found";
pub const ERROR_INVALID_PRIVATE_KEY: &str = "Invalid private key";
pub const ERROR_MISSING_DOCUMENT: &str = "Provide a valid didDocument";
pub const ERROR_ID_MISMATCH: &str = "Did document id does not match did";
pub const ERROR_UNSUPPORTED_METHOD: &str = "Unsupported did method";

/// Input for [`DidRegistrar::create`].
#[derive(Debug, Clone)]
pub struct CreateOptions {
    /// DID method, must be one of [`DidRegistrar::supported_methods`]
    pub method: String,
    pub network: Network,
    /// Optional `LinkedDomains` service endpoint
    pub endpoint: Option<String>,
    /// Raw 32-byte secp256k1 private key of the controlling account
    pub private_key: Vec<u8>,
}

impl CreateOptions {
    pub fn new(network: Network, private_key: Vec<u8>) -> Self {
        CreateOptions {
            method: DEFAULT_DID_METHOD.to_string(),
            network,
            endpoint: None,
            private_key,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

/// Registrar for ledger-anchored DIDs.
///
/// Collaborators are injected as trait objects so that the registrar can run
/// against the registry contract or an in-memory ledger alike.
#[derive(Clone)]
pub struct DidRegistrar {
    keys: KeyManager,
    ledger: Arc<dyn DidLedger>,
    resolver: Arc<dyn DidResolver>,
    records: Arc<dyn DidRecordStore>,
}

impl DidRegistrar {
    /// Creates a new registrar.
    ///
    /// # Arguments
    /// * `keys` - Key management facade
    /// * `ledger` - DID registry contract (or a stand-in)
    /// * `resolver` - Resolver for currently published documents
    /// * `records` - Local record store
    pub fn new(
        keys: KeyManager,
        ledger: Arc<dyn DidLedger>,
        resolver: Arc<dyn DidResolver>,
        records: Arc<dyn DidRecordStore>,
    ) -> Self {
        DidRegistrar {
            keys,
            ledger,
            resolver,
            records,
        }
    }

    /// DID methods this registrar can create.
    pub fn supported_methods(&self) -> Vec<String> {
        vec![DEFAULT_DID_METHOD.to_string()]
    }

    /// Creates and anchors a new DID.
    ///
    /// # Process Flow
    /// 1. Parses the private key and derives the controlling address
    /// 2. Refuses to continue if the address holds no funds
    /// 3. Imports the key (or reuses the stored one)
    /// 4. Builds the identifier and its document
    /// 5. Submits `createDID` and waits for confirmation
    /// 6. Saves the local record
    ///
    /// Nothing is persisted locally unless the ledger write succeeded.
    pub async fn create(&self, options: CreateOptions) -> DidOperationResult {
        Self::fold("create", self.try_create(options).await)
    }

    /// Replaces the document of a DID created by this registrar.
    ///
    /// # Arguments
    /// * `did` - Identifier to update
    /// * `document` - New document; its `id` must equal `did`
    /// * `private_key` - Optional additional key, appended as a new verification method
    ///
    /// The transaction is always signed with the document's controlling key,
    /// i.e. the first verification method of the locally recorded document.
    pub async fn update(
        &self,
        did: &str,
        document: Option<DidDocument>,
        private_key: Option<Vec<u8>>,
    ) -> DidOperationResult {
        Self::fold("update", self.try_update(did, document, private_key).await)
    }

    /// Deactivates a DID by overwriting its document with a stub holding only
    /// the identifier and base context.
    ///
    /// The returned result carries the last active document with
    /// `deactivated: true`. The local record keeps that document as well.
    pub async fn deactivate(&self, did: &str) -> DidOperationResult {
        Self::fold("deactivate", self.try_deactivate(did).await)
    }

    /// Currently published state of `did`.
    pub async fn resolve(&self, did: &str) -> RegistrarResult<DidResolution> {
        Ok(self.resolver.resolve(did).await?)
    }

    /// Dry-run cost of a registry call. Never mutates ledger state.
    pub async fn estimate_fee(&self, method: &str, args: &[Token]) -> RegistrarResult<FeeEstimate> {
        let from = args.first().and_then(|token| token.clone().into_address());
        Ok(self.ledger.estimate_fee(method, args, from).await?)
    }

    fn fold(operation: &str, result: RegistrarResult<DidOperationResult>) -> DidOperationResult {
        match result {
            Ok(result) => {
                if let Some(reason) = result.reason() {
                    warn!("DID {} failed: {}", operation, reason);
                }
                result
            }
            Err(e) => {
                error!("DID {} aborted: {}", operation, e);
                DidOperationResult::failed(format!("unknownError: {}", e))
            }
        }
    }

    async fn try_create(&self, options: CreateOptions) -> RegistrarResult<DidOperationResult> {
        if !self.supported_methods().contains(&options.method) {
            return Ok(DidOperationResult::failed(ERROR_UNSUPPORTED_METHOD));
        }

        let private_key = match parse_private_key(&options.private_key) {
            Ok(key) => key,
            Err(_) => return Ok(DidOperationResult::failed(ERROR_INVALID_PRIVATE_KEY)),
        };

        let address = KeyManager::address(&private_key);
        if self.ledger.balance(address).await?.is_zero() {
            return Ok(DidOperationResult::failed(ERROR_INSUFFICIENT_BALANCE));
        }

        let imported = self.keys.import_or_lookup(&private_key).await?;
        let did = Did::from_public_key(&options.method, options.network, &imported.public_key);
        let did_string = did.to_string();
        let document = build_document(&did_string, &imported.public_key, options.endpoint.as_deref());

        let signing_key = self.signing_key(&imported.key_id).await?;
        let write = self.ledger.create(&did, &document, &signing_key).await?;

        self.records.save(DidRecord::created(write.did_doc.clone())).await?;
        info!("Created {} in transaction {:?}", did_string, write.txn_hash);

        Ok(DidOperationResult::finished(write.did_doc, write.txn_hash))
    }

    async fn try_update(
        &self,
        did: &str,
        document: Option<DidDocument>,
        private_key: Option<Vec<u8>>,
    ) -> RegistrarResult<DidOperationResult> {
        let mut document = match document {
            Some(document) => document,
            None => return Ok(DidOperationResult::failed(ERROR_MISSING_DOCUMENT)),
        };
        if let Some(invalid) = validate(&document) {
            return Ok(DidOperationResult::failed(invalid.to_string()));
        }
        if document.id != did {
            return Ok(DidOperationResult::failed(ERROR_ID_MISMATCH));
        }

        let mut record = match self.active_record(did).await? {
            Some((_, record)) => record,
            None => return Ok(DidOperationResult::failed(ERROR_DID_NOT_FOUND)),
        };

        if let Some(bytes) = private_key {
            let new_key = match parse_private_key(&bytes) {
                Ok(key) => key,
                Err(_) => return Ok(DidOperationResult::failed(ERROR_INVALID_PRIVATE_KEY)),
            };
            let imported = self.keys.import_or_lookup(&new_key).await?;
            document = append_verification_method(document, &imported.public_key);
        }

        let key_id = record
            .did_document
            .controlling_key_id()
            .ok_or(RegistrarError::PublicKeyNotFound)?
            .to_string();
        let signing_key = self.signing_key(&key_id).await?;

        let parsed: Did = did.parse()?;
        let write = self
            .ledger
            .update(&parsed, &document, &signing_key)
            .await?
            .ok_or(RegistrarError::UpdateRejected)?;

        record.did_document = write.did_doc.clone();
        self.records.update(record).await?;
        info!("Updated {} in transaction {:?}", did, write.txn_hash);

        Ok(DidOperationResult::finished(write.did_doc, write.txn_hash))
    }

    async fn try_deactivate(&self, did: &str) -> RegistrarResult<DidOperationResult> {
        let (published, record) = match self.active_record(did).await? {
            Some(found) => found,
            None => return Ok(DidOperationResult::failed(ERROR_DID_NOT_FOUND)),
        };

        let key_id = record
            .did_document
            .controlling_key_id()
            .ok_or(RegistrarError::PublicKeyNotFound)?
            .to_string();
        let signing_key = self.signing_key(&key_id).await?;

        let parsed: Did = did.parse()?;
        let write = self
            .ledger
            .update(&parsed, &DidDocument::deactivated_stub(did), &signing_key)
            .await?
            .ok_or_else(|| RegistrarError::DeactivateRejected(did.to_string()))?;

        self.records.update(record).await?;
        info!("Deactivated {} in transaction {:?}", did, write.txn_hash);

        Ok(DidOperationResult::finished(published, write.txn_hash).deactivated())
    }

    /// Published document and local record of an active DID this registrar
    /// created. `None` if either is missing or the DID is deactivated.
    async fn active_record(&self, did: &str) -> RegistrarResult<Option<(DidDocument, DidRecord)>> {
        let resolution = self.resolver.resolve(did).await?;
        let record = self.records.find_created_did(did).await?;

        match (resolution.did_document, resolution.deactivated, record) {
            (Some(published), false, Some(record)) => Ok(Some((published, record))),
            _ => Ok(None),
        }
    }

    async fn signing_key(&self, key_id: &str) -> RegistrarResult<SigningKey> {
        self.keys
            .signing_key(key_id)
            .await?
            .ok_or_else(|| RegistrarError::SigningKeyNotFound(key_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::models::did::LINKED_DOMAINS;
    use crate::testing::{funded_key, registrar_fixture, Fixture};
    use ethers::types::H256;

    async fn created(fixture: &Fixture, key: &SigningKey) -> DidDocument {
        let result = fixture
            .registrar
            .create(CreateOptions::new(Network::Testnet, key.to_bytes().to_vec()))
            .await;
        assert!(result.is_finished(), "{:?}", result);
        result.did_document().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_without_funds_touches_nothing() {
        let fixture = registrar_fixture();
        let key = SigningKey::random(&mut rand::thread_rng());

        let result = fixture
            .registrar
            .create(CreateOptions::new(Network::Testnet, key.to_bytes().to_vec()))
            .await;

        assert_eq!(result.reason(), Some(ERROR_INSUFFICIENT_BALANCE));
        assert_eq!(fixture.keys.calls(), 0);
        assert_eq!(fixture.ledger.writes(), 0);
        assert!(fixture.records.is_empty());
    }

    #[tokio::test]
    async fn test_create_then_resolve() {
        let fixture = registrar_fixture();
        let key = funded_key(&fixture);

        let result = fixture
            .registrar
            .create(
                CreateOptions::new(Network::Testnet, key.to_bytes().to_vec())
                    .with_endpoint("https://example.com"),
            )
            .await;
        assert!(result.is_finished());
        assert!(result.did_registration_metadata.txn.is_some());
        let did = result.did_document().unwrap().id.clone();

        let resolution = fixture.registrar.resolve(&did).await.unwrap();
        assert!(resolution.is_active());
        let document = resolution.did_document.unwrap();

        let methods = document.verification_methods();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].id, format!("{}#key-1", did));

        let services = document.service.clone().unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].id, format!("{}#linked-domain", did));
        assert_eq!(services[0].type_, LINKED_DOMAINS);
        assert_eq!(services[0].service_endpoint, "https://example.com");

        assert_eq!(document.authentication, vec![format!("{}#key-1", did)]);
        assert!(fixture.records.find_created_did(&did).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let fixture = registrar_fixture();

        let result = fixture
            .registrar
            .create(CreateOptions::new(Network::Testnet, vec![1, 2, 3]))
            .await;
        assert_eq!(result.reason(), Some(ERROR_INVALID_PRIVATE_KEY));

        let key = funded_key(&fixture);
        let mut options = CreateOptions::new(Network::Mainnet, key.to_bytes().to_vec());
        options.method = "ethr".into();
        let result = fixture.registrar.create(options).await;
        assert_eq!(result.reason(), Some(ERROR_UNSUPPORTED_METHOD));
        assert_eq!(fixture.ledger.writes(), 0);
    }

    #[tokio::test]
    async fn test_second_create_for_same_key_fails_without_new_record() {
        let fixture = registrar_fixture();
        let key = funded_key(&fixture);
        created(&fixture, &key).await;

        let result = fixture
            .registrar
            .create(CreateOptions::new(Network::Testnet, key.to_bytes().to_vec()))
            .await;

        assert!(result.reason().unwrap().starts_with("unknownError: "));
        assert_eq!(fixture.records.len(), 1);
        assert_eq!(fixture.keys.stored(), 1);
    }

    #[tokio::test]
    async fn test_update_with_additional_key() {
        let fixture = registrar_fixture();
        let key = funded_key(&fixture);
        let document = created(&fixture, &key).await;
        let did = document.id.clone();

        let extra = SigningKey::random(&mut rand::thread_rng());
        let result = fixture
            .registrar
            .update(&did, Some(document), Some(extra.to_bytes().to_vec()))
            .await;
        assert!(result.is_finished(), "{:?}", result);

        let published = fixture.registrar.resolve(&did).await.unwrap().did_document.unwrap();
        assert_eq!(published.verification_methods().len(), 2);
        assert_eq!(published.verification_methods()[1].id, format!("{}#key-2", did));

        let record = fixture.records.find_created_did(&did).await.unwrap().unwrap();
        assert_eq!(record.did_document, published);
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_documents() {
        let fixture = registrar_fixture();
        let key = funded_key(&fixture);
        let document = created(&fixture, &key).await;
        let did = document.id.clone();

        let result = fixture.registrar.update(&did, None, None).await;
        assert_eq!(result.reason(), Some(ERROR_MISSING_DOCUMENT));

        let mut empty = document.clone();
        empty.verification_method = Some(vec![]);
        let result = fixture.registrar.update(&did, Some(empty), None).await;
        assert_eq!(result.reason(), Some("verificationMethod must not be empty"));

        let other = "did:polygon:testnet:0x138d2231e4362fc0e028576Fb2DF56904bd59C1b";
        let result = fixture.registrar.update(other, Some(document.clone()), None).await;
        assert_eq!(result.reason(), Some(ERROR_ID_MISMATCH));

        let result = fixture
            .registrar
            .update(&did, Some(document), Some(vec![0u8; 32]))
            .await;
        assert_eq!(result.reason(), Some(ERROR_INVALID_PRIVATE_KEY));
        assert_eq!(fixture.ledger.writes(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_did() {
        let fixture = registrar_fixture();
        let key = SigningKey::random(&mut rand::thread_rng());
        let did = crate::models::did::build_did("polygon", Network::Testnet, key.verifying_key());
        let document = crate::did::builder::build_document(&did, key.verifying_key(), None);

        let result = fixture.registrar.update(&did, Some(document), None).await;
        assert_eq!(result.reason(), Some(ERROR_DID_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_rejected_update_is_reported() {
        let fixture = registrar_fixture();
        let key = funded_key(&fixture);
        let document = created(&fixture, &key).await;

        fixture.ledger.reject_updates(true);
        let result = fixture.registrar.update(&document.id.clone(), Some(document), None).await;

        assert_eq!(
            result.reason(),
            Some("unknownError: Unable to update did document")
        );
    }

    #[tokio::test]
    async fn test_update_without_recorded_public_key() {
        let fixture = registrar_fixture();
        let key = funded_key(&fixture);
        let document = created(&fixture, &key).await;
        let did = document.id.clone();

        let mut record = fixture.records.find_created_did(&did).await.unwrap().unwrap();
        record.did_document.verification_method.as_mut().unwrap()[0].public_key_base58 = None;
        fixture.records.update(record).await.unwrap();
        let before = fixture.records.find_created_did(&did).await.unwrap();

        let result = fixture.registrar.update(&did, Some(document), None).await;

        assert_eq!(result.reason(), Some("unknownError: Public Key not found"));
        assert_eq!(fixture.records.find_created_did(&did).await.unwrap(), before);
        assert_eq!(fixture.ledger.writes(), 1);
    }

    #[tokio::test]
    async fn test_rejected_deactivate_is_reported() {
        let fixture = registrar_fixture();
        let key = funded_key(&fixture);
        let document = created(&fixture, &key).await;
        let did = document.id.clone();
        let before = fixture.records.find_created_did(&did).await.unwrap();

        fixture.ledger.reject_updates(true);
        let result = fixture.registrar.deactivate(&did).await;

        assert_eq!(
            result.reason(),
            Some(format!("unknownError: Unable to deactivate did document for did : {}", did).as_str())
        );
        assert_eq!(fixture.records.find_created_did(&did).await.unwrap(), before);
        assert!(fixture.registrar.resolve(&did).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn test_update_signed_by_foreign_key_reverts() {
        let fixture = registrar_fixture();
        let key = funded_key(&fixture);
        let document = created(&fixture, &key).await;
        let did = document.id.clone();

        let stranger = SigningKey::random(&mut rand::thread_rng());
        let imported = KeyManager::new(fixture.keys.clone())
            .import_or_lookup(&stranger)
            .await
            .unwrap();
        let mut record = fixture.records.find_created_did(&did).await.unwrap().unwrap();
        record.did_document.verification_method.as_mut().unwrap()[0].public_key_base58 =
            Some(imported.key_id);
        fixture.records.update(record).await.unwrap();
        let before = fixture.records.find_created_did(&did).await.unwrap();

        let result = fixture.registrar.update(&did, Some(document.clone()), None).await;

        let expected = format!("unknownError: {}", LedgerError::Reverted(H256::zero()));
        assert_eq!(result.reason(), Some(expected.as_str()));
        assert_eq!(fixture.records.find_created_did(&did).await.unwrap(), before);
        let published = fixture.registrar.resolve(&did).await.unwrap().did_document;
        assert_eq!(published, Some(document));
        assert_eq!(fixture.ledger.writes(), 1);
    }

    #[tokio::test]
    async fn test_deactivate_then_update_is_not_found() {
        let fixture = registrar_fixture();
        let key = funded_key(&fixture);
        let document = created(&fixture, &key).await;
        let did = document.id.clone();

        let result = fixture.registrar.deactivate(&did).await;
        assert!(result.is_finished());
        assert_eq!(result.did_document_metadata.deactivated, Some(true));
        assert_eq!(result.did_document(), Some(&document));

        let resolution = fixture.registrar.resolve(&did).await.unwrap();
        assert!(resolution.deactivated);
        assert!(!resolution.is_active());

        let record = fixture.records.find_created_did(&did).await.unwrap().unwrap();
        assert_eq!(record.did_document, document);

        let result = fixture.registrar.update(&did, Some(document), None).await;
        assert_eq!(result.reason(), Some(ERROR_DID_NOT_FOUND));

        let result = fixture.registrar.deactivate(&did).await;
        assert_eq!(result.reason(), Some(ERROR_DID_NOT_FOUND));
    }

    #[test]
    fn test_supported_methods() {
        let fixture = registrar_fixture();
        assert_eq!(fixture.registrar.supported_methods(), vec!["polygon".to_string()]);
    }
}
