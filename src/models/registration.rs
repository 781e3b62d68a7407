// src/models/registration.rs
//! Result object returned by every registrar lifecycle operation.
//!
//! Business outcomes are values, not errors: a call either `finished` with the
//! anchored document or `failed` with a reason string.

use crate::models::did::DidDocument;
use ethers::types::H256;
use serde::{Deserialize, Serialize};

/// Terminal state of a lifecycle call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum DidState {
    Finished {
        did: String,
        #[serde(rename = "didDocument")]
        did_document: DidDocument,
    },
    Failed {
        reason: String,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DidDocumentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DidRegistrationMetadata {
    /// Hash of the confirmed ledger transaction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txn: Option<H256>,
}

/// Uniform result of create / update / deactivate.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DidOperationResult {
    pub did_document_metadata: DidDocumentMetadata,
    pub did_registration_metadata: DidRegistrationMetadata,
    pub did_state: DidState,
}

impl DidOperationResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        DidOperationResult {
            did_document_metadata: DidDocumentMetadata::default(),
            did_registration_metadata: DidRegistrationMetadata::default(),
            did_state: DidState::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn finished(did_document: DidDocument, txn: H256) -> Self {
        DidOperationResult {
            did_document_metadata: DidDocumentMetadata::default(),
            did_registration_metadata: DidRegistrationMetadata { txn: Some(txn) },
            did_state: DidState::Finished {
                did: did_document.id.clone(),
                did_document,
            },
        }
    }

    /// Marks the result as a deactivation.
    pub fn deactivated(mut self) -> Self {
        self.did_document_metadata.deactivated = Some(true);
        self
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.did_state, DidState::Finished { .. })
    }

    /// Failure reason, if the call failed.
    pub fn reason(&self) -> Option<&str> {
        match &self.did_state {
            DidState::Failed { reason } => Some(reason),
            DidState::Finished { .. } => None,
        }
    }

    /// Anchored document, if the call finished.
    pub fn did_document(&self) -> Option<&DidDocument> {
        match &self.did_state {
            DidState::Finished { did_document, .. } => Some(did_document),
            DidState::Failed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_shape() {
        let result = DidOperationResult::failed("Did not found");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "didDocumentMetadata": {},
                "didRegistrationMetadata": {},
                "didState": { "state": "failed", "reason": "Did not found" }
            })
        );
    }

    #[test]
    fn test_finished_shape_carries_txn_and_flag() {
        let document = DidDocument::deactivated_stub("did:polygon:0x138d2231e4362fc0e028576Fb2DF56904bd59C1b");
        let result = DidOperationResult::finished(document, H256::zero()).deactivated();
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["didState"]["state"], "finished");
        assert_eq!(value["didState"]["did"], "did:polygon:0x138d2231e4362fc0e028576Fb2DF56904bd59C1b");
        assert_eq!(value["didDocumentMetadata"]["deactivated"], true);
        assert!(value["didRegistrationMetadata"]["txn"].is_string());
    }
}
