// src/testing.rs
//! In-memory stand-ins for the ledger and key store, shared by unit tests.
//!
//! [`FakeLedger`] behaves like both registry contracts: documents are keyed by
//! account address and only that account may write them, resources are kept
//! per owner in insertion order. Every successful write gets a fresh
//! transaction hash.

use crate::blockchain::ledger_client::{FeeEstimate, LedgerReceipt};
use crate::contracts::did_registry::{DidLedger, LedgerWrite};
use crate::contracts::resource_registry::ResourceRegistry;
use crate::did::resolver::LedgerDidResolver;
use crate::error::{KeyStoreError, LedgerError};
use crate::models::did::{build_did, Did, DidDocument, Network};
use crate::services::registrar::DidRegistrar;
use crate::services::resource_service::ResourceLedgerService;
use crate::storage::record_store::InMemoryDidRecordStore;
use crate::wallet::key_management::{InMemoryKeyStore, KeyManager, KeyStore};
use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, H256, U256};
use ethers::utils::secret_key_to_address;
use k256::ecdsa::{SigningKey, VerifyingKey};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct FakeLedger {
    balances: Mutex<HashMap<Address, U256>>,
    documents: Mutex<HashMap<Address, String>>,
    resources: Mutex<HashMap<Address, Vec<(String, String)>>>,
    network: Network,
    reject_updates: AtomicBool,
    failing_resource_updates: AtomicUsize,
    writes: AtomicUsize,
    nonce: AtomicU64,
}

impl FakeLedger {
    /// Ledger serving identifiers of `network` (the default serves testnet).
    pub fn on(network: Network) -> Self {
        FakeLedger {
            network,
            ..Default::default()
        }
    }

    pub fn fund(&self, address: Address, amount: U256) {
        self.balances.lock().unwrap().insert(address, amount);
    }

    /// Makes `update` answer without a confirmation.
    pub fn reject_updates(&self, reject: bool) {
        self.reject_updates.store(reject, Ordering::SeqCst);
    }

    /// Makes the next `count` resource rewrites revert.
    pub fn fail_resource_updates(&self, count: usize) {
        self.failing_resource_updates.store(count, Ordering::SeqCst);
    }

    /// Number of confirmed writes so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn confirm(&self) -> H256 {
        self.writes.fetch_add(1, Ordering::SeqCst);
        H256::from_low_u64_be(self.nonce.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn receipt(&self, from: Address) -> LedgerReceipt {
        LedgerReceipt {
            txn_hash: self.confirm(),
            block_number: None,
            from,
            to: None,
            gas_used: None,
        }
    }

    fn authorize(owner: Address, signing_key: &SigningKey) -> Result<(), LedgerError> {
        if secret_key_to_address(signing_key) == owner {
            Ok(())
        } else {
            Err(LedgerError::Reverted(H256::zero()))
        }
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

    fn fee(method: &str) -> FeeEstimate {
        FeeEstimate {
            transaction_fee: "0.000042".into(),
            gas_limit: U256::from(21_000u64),
            gas_price: U256::from(2_000_000_000u64),
            network: "polygon-amoy".into(),
            chain_id: 80002,
            method: method.to_string(),
        }
    }
}

#[async_trait]
impl DidLedger for FakeLedger {
    fn network(&self) -> Network {
        self.network
    }

    async fn balance(&self, address: Address) -> Result<U256, LedgerError> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn create(
        &self,
        did: &Did,
        document: &DidDocument,
        signing_key: &SigningKey,
    ) -> Result<LedgerWrite, LedgerError> {
        self.ensure_network(did)?;
        Self::authorize(did.address, signing_key)?;
        let mut documents = self.documents.lock().unwrap();
        if documents.contains_key(&did.address) {
            return Err(LedgerError::Reverted(H256::zero()));
        }
        documents.insert(did.address, serde_json::to_string(document).unwrap());

        Ok(LedgerWrite {
            txn_hash: self.confirm(),
            did_doc: document.clone(),
        })
    }

    async fn update(
        &self,
        did: &Did,
        document: &DidDocument,
        signing_key: &SigningKey,
    ) -> Result<Option<LedgerWrite>, LedgerError> {
        self.ensure_network(did)?;
        Self::authorize(did.address, signing_key)?;
        if self.reject_updates.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let mut documents = self.documents.lock().unwrap();
        if !documents.contains_key(&did.address) {
            return Err(LedgerError::Reverted(H256::zero()));
        }
        documents.insert(did.address, serde_json::to_string(document).unwrap());

        Ok(Some(LedgerWrite {
            txn_hash: self.confirm(),
            did_doc: document.clone(),
        }))
    }

    async fn get_document(&self, did: &Did) -> Result<Option<DidDocument>, LedgerError> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .get(&did.address)
            .map(|json| serde_json::from_str(json).unwrap()))
    }

    async fn estimate_fee(
        &self,
        method: &str,
        _args: &[Token],
        _from: Option<Address>,
    ) -> Result<FeeEstimate, LedgerError> {
        Ok(Self::fee(method))
    }
}

#[async_trait]
impl ResourceRegistry for FakeLedger {
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
        Self::authorize(owner, signing_key)?;
        self.resources
            .lock()
            .unwrap()
            .entry(owner)
            .or_default()
            .push((resource_id.to_string(), payload.to_string()));
        Ok(Some(self.receipt(owner)))
    }

    async fn update_resource(
        &self,
        owner: Address,
        resource_id: &str,
        payload: &str,
        signing_key: &SigningKey,
    ) -> Result<Option<LedgerReceipt>, LedgerError> {
        Self::authorize(owner, signing_key)?;
        let failing = self.failing_resource_updates.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_resource_updates.store(failing - 1, Ordering::SeqCst);
            return Err(LedgerError::Reverted(H256::zero()));
        }
        let mut resources = self.resources.lock().unwrap();
        let entry = resources
            .get_mut(&owner)
            .and_then(|list| list.iter_mut().find(|(id, _)| id == resource_id))
            .ok_or(LedgerError::Reverted(H256::zero()))?;
        entry.1 = payload.to_string();
        drop(resources);
        Ok(Some(self.receipt(owner)))
    }

    async fn get_resource(
        &self,
        owner: Address,
        resource_id: &str,
    ) -> Result<Option<String>, LedgerError> {
        Ok(self.resources.lock().unwrap().get(&owner).and_then(|list| {
            list.iter()
                .find(|(id, _)| id == resource_id)
                .map(|(_, payload)| payload.clone())
        }))
    }

    async fn get_all_resources(&self, owner: Address) -> Result<Vec<String>, LedgerError> {
        Ok(self
            .resources
            .lock()
            .unwrap()
            .get(&owner)
            .map(|list| list.iter().map(|(_, payload)| payload.clone()).collect())
            .unwrap_or_default())
    }

    async fn estimate_fee(
        &self,
        method: &str,
        _args: &[Token],
        _from: Option<Address>,
    ) -> Result<FeeEstimate, LedgerError> {
        Ok(Self::fee(method))
    }
}

/// Key store that counts every call made against it.
#[derive(Default)]
pub struct CountingKeyStore {
    inner: InMemoryKeyStore,
    calls: AtomicUsize,
}

impl CountingKeyStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> usize {
        self.inner.len()
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyStore for CountingKeyStore {
    async fn public_key(&self, key_id: &str) -> Result<Option<VerifyingKey>, KeyStoreError> {
        self.touch();
        self.inner.public_key(key_id).await
    }

    async fn import_key(
        &self,
        key_id: &str,
        private_key: SigningKey,
    ) -> Result<VerifyingKey, KeyStoreError> {
        self.touch();
        self.inner.import_key(key_id, private_key).await
    }

    async fn signing_key(&self, key_id: &str) -> Result<Option<SigningKey>, KeyStoreError> {
        self.touch();
        self.inner.signing_key(key_id).await
    }
}

/// Registrar wired to in-memory collaborators.
pub struct Fixture {
    pub registrar: DidRegistrar,
    pub resources: ResourceLedgerService,
    pub ledger: Arc<FakeLedger>,
    pub keys: Arc<CountingKeyStore>,
    pub records: Arc<InMemoryDidRecordStore>,
}

pub fn registrar_fixture() -> Fixture {
    let ledger = Arc::new(FakeLedger::default());
    let keys = Arc::new(CountingKeyStore::default());
    let records = Arc::new(InMemoryDidRecordStore::new());
    let manager = KeyManager::new(keys.clone());

    Fixture {
        registrar: DidRegistrar::new(
            manager.clone(),
            ledger.clone(),
            Arc::new(LedgerDidResolver::new(ledger.clone())),
            records.clone(),
        ),
        resources: ResourceLedgerService::new(ledger.clone(), manager),
        ledger,
        keys,
        records,
    }
}

/// Fresh key whose account holds one ether on the fake ledger.
pub fn funded_key(fixture: &Fixture) -> SigningKey {
    let key = SigningKey::random(&mut rand::thread_rng());
    fixture
        .ledger
        .fund(secret_key_to_address(&key), U256::exp10(18));
    key
}

/// Resource service plus a DID whose controlling key is already imported.
pub struct ResourceFixture {
    pub service: ResourceLedgerService,
    pub ledger: Arc<FakeLedger>,
    pub did: String,
    pub key_id: String,
}

pub async fn resource_fixture() -> ResourceFixture {
    let ledger = Arc::new(FakeLedger::default());
    let keys = KeyManager::new(Arc::new(InMemoryKeyStore::new()));
    let key = SigningKey::random(&mut rand::thread_rng());
    let imported = keys.import_or_lookup(&key).await.unwrap();

    ResourceFixture {
        service: ResourceLedgerService::new(ledger.clone(), keys),
        ledger,
        did: build_did("polygon", Network::Testnet, &imported.public_key),
        key_id: imported.key_id,
    }
}
