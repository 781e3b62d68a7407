// src/did/resolver.rs
//! DID resolution against the registry contract.
//!
//! Resolution outcomes follow DID Core conventions: a missing or malformed
//! identifier is reported through the `error` field, not as an `Err`. Only
//! transport failures are returned as errors.
//!
//! The network segment is part of the identity: a document is only returned
//! for an identifier on the ledger's own network whose `id` names that same
//! identifier.

use crate::contracts::did_registry::DidLedger;
use crate::error::LedgerError;
use crate::models::did::{Did, DidDocument};
use async_trait::async_trait;
use std::sync::Arc;

pub const ERROR_INVALID_DID: &str = "invalidDid";
pub const ERROR_NOT_FOUND: &str = "notFound";

/// Currently published state of a DID.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DidResolution {
    pub did_document: Option<DidDocument>,
    /// `true` once the anchored document is the deactivation stub
    pub deactivated: bool,
    /// Resolution error code (`invalidDid`, `notFound`)
    pub error: Option<String>,
}

impl DidResolution {
    fn error(code: &str) -> Self {
        DidResolution {
            error: Some(code.to_string()),
            ..Default::default()
        }
    }

    /// A document exists and has not been deactivated.
    pub fn is_active(&self) -> bool {
        self.did_document.is_some() && !self.deactivated
    }
}

/// Resolves an identifier to its published document.
#[async_trait]
pub trait DidResolver: Send + Sync {
    async fn resolve(&self, did: &str) -> Result<DidResolution, LedgerError>;
}

/// Resolver that reads documents straight from the registry contract.
pub struct LedgerDidResolver {
    ledger: Arc<dyn DidLedger>,
}

impl LedgerDidResolver {
    pub fn new(ledger: Arc<dyn DidLedger>) -> Self {
        LedgerDidResolver { ledger }
    }
}

#[async_trait]
impl DidResolver for LedgerDidResolver {
    async fn resolve(&self, did: &str) -> Result<DidResolution, LedgerError> {
        let parsed: Did = match did.parse() {
            Ok(parsed) => parsed,
            Err(_) => return Ok(DidResolution::error(ERROR_INVALID_DID)),
        };

        if parsed.network != self.ledger.network() {
            return Ok(DidResolution::error(ERROR_NOT_FOUND));
        }

        match self.ledger.get_document(&parsed).await? {
            // The anchored document must describe this exact identifier, not a
            // sibling on another network that shares the address.
            Some(document) if document.id.parse::<Did>().ok().as_ref() == Some(&parsed) => {
                Ok(DidResolution {
                    deactivated: document.is_deactivated(),
                    did_document: Some(document),
                    error: None,
                })
            }
            _ => Ok(DidResolution::error(ERROR_NOT_FOUND)),
        }
    }
}
