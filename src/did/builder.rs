// src/did/builder.rs
//! DID Document construction.
//!
//! Documents created here carry secp256k1 verification methods numbered
//! `<did>#key-1`, `<did>#key-2`, ... in insertion order.

use crate::models::did::{
    DidDocument, Service, VerificationMethod, DID_CONTEXT,
    ECDSA_SECP256K1_VERIFICATION_KEY_2019, LINKED_DOMAINS, SECP256K1_CONTEXT,
};
use crate::utils::crypto::public_key_base58;
use k256::ecdsa::VerifyingKey;

/// Verification method `<controller>#key-<index>` for `public_key`.
pub fn verification_method(controller: &str, index: usize, public_key: &VerifyingKey) -> VerificationMethod {
    VerificationMethod {
        id: format!("{}#key-{}", controller, index),
        type_: ECDSA_SECP256K1_VERIFICATION_KEY_2019.to_string(),
        controller: controller.to_string(),
        public_key_base58: Some(public_key_base58(public_key)),
    }
}

/// Builds the initial document for a freshly created DID.
///
/// # Arguments
/// * `did` - Identifier the document describes
/// * `public_key` - Controlling key, becomes `#key-1`
/// * `endpoint` - Optional URL published as a `LinkedDomains` service at `#linked-domain`
///
/// # Returns
/// A document with exactly one verification method, referenced by all five
/// verification relationships.
pub fn build_document(did: &str, public_key: &VerifyingKey, endpoint: Option<&str>) -> DidDocument {
    let method = verification_method(did, 1, public_key);
    let method_id = method.id.clone();

    let service = endpoint.map(|endpoint| {
        vec![Service {
            id: format!("{}#linked-domain", did),
            type_: LINKED_DOMAINS.to_string(),
            service_endpoint: endpoint.to_string(),
        }]
    });

    DidDocument {
        context: vec![DID_CONTEXT.to_string(), SECP256K1_CONTEXT.to_string()],
        id: did.to_string(),
        verification_method: Some(vec![method]),
        authentication: vec![method_id.clone()],
        assertion_method: vec![method_id.clone()],
        capability_delegation: vec![method_id.clone()],
        capability_invocation: vec![method_id.clone()],
        key_agreement: vec![method_id],
        service,
    }
}

/// Appends `public_key` as `#key-<count + 1>`, controlled by the document's id.
///
/// Existing methods are left untouched and keep their numbers.
pub fn append_verification_method(mut document: DidDocument, public_key: &VerifyingKey) -> DidDocument {
    let next_index = document.verification_methods().len() + 1;
    let method = verification_method(&document.id, next_index, public_key);
    document
        .verification_method
        .get_or_insert_with(Vec::new)
        .push(method);
    document
}
