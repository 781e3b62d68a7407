// src/storage/record_store.rs
//! Local persistence of DID records.
//!
//! A [`DidRecord`] mirrors the document this agent anchored for a DID. It is
//! written after a successful create, overwritten after a successful update,
//! and consulted before update/deactivate to confirm the DID is ours. Records
//! are never deleted.
//!
//! Two backends are provided:
//! - [`InMemoryDidRecordStore`] for tests and ephemeral agents
//! - [`JsonFileDidRecordStore`], a single JSON file rewritten on every change

use crate::error::RecordStoreError;
use crate::models::did::DidDocument;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// How this agent relates to a DID.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DidRole {
    /// Created (and therefore controlled) by this agent
    Created,
    /// Only resolved by this agent
    Received,
}

/// Local mirror of an anchored DID Document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DidRecord {
    pub did: String,
    pub role: DidRole,
    pub did_document: DidDocument,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DidRecord {
    /// Record for a DID this agent just created.
    pub fn created(did_document: DidDocument) -> Self {
        let now = Utc::now();
        DidRecord {
            did: did_document.id.clone(),
            role: DidRole::Created,
            did_document,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Storage for [`DidRecord`]s.
#[async_trait]
pub trait DidRecordStore: Send + Sync {
    /// Record for a DID this agent created, if any.
    async fn find_created_did(&self, did: &str) -> Result<Option<DidRecord>, RecordStoreError>;

    /// Stores a new record, replacing any previous record for the same DID.
    async fn save(&self, record: DidRecord) -> Result<(), RecordStoreError>;

    /// Overwrites an existing record.
    ///
    /// # Errors
    /// [`RecordStoreError::NotFound`] if the DID has no record.
    async fn update(&self, record: DidRecord) -> Result<(), RecordStoreError>;
}

/// In-memory record store.
#[derive(Default)]
pub struct InMemoryDidRecordStore {
    records: Mutex<HashMap<String, DidRecord>>,
}

impl InMemoryDidRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, DidRecord>>, RecordStoreError> {
        self.records
            .lock()
            .map_err(|e| RecordStoreError::Unavailable(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DidRecordStore for InMemoryDidRecordStore {
    async fn find_created_did(&self, did: &str) -> Result<Option<DidRecord>, RecordStoreError> {
        Ok(self
            .lock()?
            .get(did)
            .filter(|record| record.role == DidRole::Created)
            .cloned())
    }

    async fn save(&self, record: DidRecord) -> Result<(), RecordStoreError> {
        self.lock()?.insert(record.did.clone(), record);
        Ok(())
    }

    async fn update(&self, mut record: DidRecord) -> Result<(), RecordStoreError> {
        let mut records = self.lock()?;
        if !records.contains_key(&record.did) {
            return Err(RecordStoreError::NotFound(record.did));
        }
        record.updated_at = Utc::now();
        records.insert(record.did.clone(), record);
        Ok(())
    }
}

/// Record store persisted as one JSON object (`did -> record`) on disk.
///
/// Writes go to a temporary file that is then renamed over the original, so a
/// crash mid-write leaves the previous contents intact.
pub struct JsonFileDidRecordStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileDidRecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileDidRecordStore {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<HashMap<String, DidRecord>, RecordStoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, records: &HashMap<String, DidRecord>) -> Result<(), RecordStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(records)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Persisted {} DID records to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl DidRecordStore for JsonFileDidRecordStore {
    async fn find_created_did(&self, did: &str) -> Result<Option<DidRecord>, RecordStoreError> {
        let records = self.load().await?;
        Ok(records
            .get(did)
            .filter(|record| record.role == DidRole::Created)
            .cloned())
    }

    async fn save(&self, record: DidRecord) -> Result<(), RecordStoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        records.insert(record.did.clone(), record);
        self.persist(&records).await
    }

    async fn update(&self, mut record: DidRecord) -> Result<(), RecordStoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        if !records.contains_key(&record.did) {
            return Err(RecordStoreError::NotFound(record.did));
        }
        record.updated_at = Utc::now();
        records.insert(record.did.clone(), record);
        self.persist(&records).await
    }
}
