// src/did/validator.rs
//! Structural validation of DID Documents submitted for update.
//!
//! Checks run in a fixed order and the first violation wins, so callers get a
//! precise reason rather than a yes/no answer.

use crate::models::did::{
    is_valid_did, DidDocument, Service, VerificationMethod,
    ECDSA_SECP256K1_VERIFICATION_KEY_2019,
};
use crate::utils::crypto::public_key_from_base58;
use serde_json::Value;
use thiserror::Error;

/// The first structural rule a document breaks.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("id is required")]
    IdRequired,

    #[error("id must be a valid did")]
    InvalidId,

    #[error("verificationMethod is required")]
    VerificationMethodRequired,

    #[error("verificationMethod must be an array")]
    VerificationMethodNotArray,

    #[error("verificationMethod must not be empty")]
    VerificationMethodEmpty,

    #[error("verificationMethod is Invalid")]
    InvalidVerificationMethod,

    #[error("Service is Invalid")]
    InvalidService,

    #[error("didDocument is malformed")]
    Malformed,
}

fn is_valid_verification_method(method: &VerificationMethod) -> bool {
    match method.type_.as_str() {
        ECDSA_SECP256K1_VERIFICATION_KEY_2019 => {
            method
                .public_key_base58
                .as_deref()
                .map_or(false, |key| public_key_from_base58(key).is_some())
                && !method.controller.is_empty()
                && !method.id.is_empty()
        }
        _ => false,
    }
}

fn is_valid_service(service: &Service) -> bool {
    !service.id.is_empty() && !service.type_.is_empty() && !service.service_endpoint.is_empty()
}

/// Validates a typed document.
///
/// # Returns
/// `None` when the document is acceptable, otherwise the first violation in
/// this order: id, verificationMethod presence, emptiness, method contents,
/// services.
pub fn validate(document: &DidDocument) -> Option<ValidationError> {
    if document.id.is_empty() {
        return Some(ValidationError::IdRequired);
    }
    if !is_valid_did(&document.id) {
        return Some(ValidationError::InvalidId);
    }

    let methods = match &document.verification_method {
        None => return Some(ValidationError::VerificationMethodRequired),
        Some(methods) => methods,
    };
    if methods.is_empty() {
        return Some(ValidationError::VerificationMethodEmpty);
    }
    if !methods.iter().all(is_valid_verification_method) {
        return Some(ValidationError::InvalidVerificationMethod);
    }

    if let Some(services) = &document.service {
        if !services.iter().all(is_valid_service) {
            return Some(ValidationError::InvalidService);
        }
    }

    None
}

/// Validates raw JSON and returns the typed document on success.
///
/// Catches shape errors that cannot survive deserialization into
/// [`DidDocument`], such as a `verificationMethod` that is not an array.
pub fn validate_json(value: &Value) -> Result<DidDocument, ValidationError> {
    match value.get("id") {
        Some(Value::String(id)) if !id.is_empty() => {}
        _ => return Err(ValidationError::IdRequired),
    }

    match value.get("verificationMethod") {
        None | Some(Value::Null) => return Err(ValidationError::VerificationMethodRequired),
        Some(Value::Array(methods)) => {
            if methods
                .iter()
                .any(|m| serde_json::from_value::<VerificationMethod>(m.clone()).is_err())
            {
                return Err(ValidationError::InvalidVerificationMethod);
            }
        }
        Some(_) => return Err(ValidationError::VerificationMethodNotArray),
    }

    if let Some(services) = value.get("service") {
        let parsed: Result<Vec<Service>, _> = serde_json::from_value(services.clone());
        if parsed.is_err() {
            return Err(ValidationError::InvalidService);
        }
    }

    let document: DidDocument =
        serde_json::from_value(value.clone()).map_err(|_| ValidationError::Malformed)?;

    match validate(&document) {
        Some(error) => Err(error),
        None => Ok(document),
    }
}
