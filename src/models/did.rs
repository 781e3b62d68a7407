// src/models/did.rs
//! Decentralized Identifier (DID) data model implementation.
//!
//! Defines the identifier grammar used by the registry,
//! `did:<method>[:testnet]:0x<40 hex chars>`, and the W3C-style DID Document
//! that is stored as JSON in the registry contract, following the
//! [DID Core Specification](https://www.w3.org/TR/did-core/).

use crate::error::InvalidDid;
use crate::utils::serialization::one_or_many;
use ethers::types::Address;
use ethers::utils::{public_key_to_address, to_checksum};
use k256::ecdsa::VerifyingKey;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// DID method registered by this crate.
pub const DEFAULT_DID_METHOD: &str = "polygon";

/// Base DID Core JSON-LD context.
pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

/// JSON-LD context for secp256k1 verification keys.
pub const SECP256K1_CONTEXT: &str = "https://w3id.org/security/suites/secp256k1-2019/v1";

/// The only verification method type this registry accepts.
pub const ECDSA_SECP256K1_VERIFICATION_KEY_2019: &str = "EcdsaSecp256k1VerificationKey2019";

/// Service type used for the optional endpoint given at creation.
pub const LINKED_DOMAINS: &str = "LinkedDomains";

static DID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^did:[a-z0-9]+(:testnet)?:0x[0-9a-fA-F]{40}$").expect("DID regex is valid")
});

/// Returns `true` if `did` follows `did:<method>[:testnet]:0x<40 hex>`.
pub fn is_valid_did(did: &str) -> bool {
    DID_REGEX.is_match(did)
}

/// Ledger network an identifier lives on.
///
/// Mainnet identifiers omit the network segment entirely.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            other => Err(format!("Unknown network: {}", other)),
        }
    }
}

/// A parsed ledger-anchored identifier.
///
/// # Format
/// ```text
/// did:<method>:0x<address>            (mainnet)
/// did:<method>:testnet:0x<address>    (testnet)
/// ```
/// The address is the 20-byte account that controls the document on the
/// registry contract. It is rendered with an EIP-55 checksum.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Did {
    /// DID method name, e.g. `polygon`
    pub method: String,
    /// Network segment (absent on mainnet)
    pub network: Network,
    /// Controlling account address
    pub address: Address,
}

impl Did {
    /// Derives the identifier for a secp256k1 public key.
    ///
    /// # Arguments
    /// * `method` - DID method name
    /// * `network` - Target network
    /// * `public_key` - Key whose Ethereum address becomes the identifier
    pub fn from_public_key(method: &str, network: Network, public_key: &VerifyingKey) -> Self {
        Did {
            method: method.to_string(),
            network,
            address: public_key_to_address(public_key),
        }
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let address = to_checksum(&self.address, None);
        match self.network {
            Network::Mainnet => write!(f, "did:{}:{}", self.method, address),
            Network::Testnet => write!(f, "did:{}:testnet:{}", self.method, address),
        }
    }
}

impl FromStr for Did {
    type Err = InvalidDid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_valid_did(s) {
            return Err(InvalidDid(s.to_string()));
        }

        let parts: Vec<&str> = s.split(':').collect();
        let (network, address) = match parts.as_slice() {
            [_, _, "testnet", address] => (Network::Testnet, *address),
            [_, _, address] => (Network::Mainnet, *address),
            _ => return Err(InvalidDid(s.to_string())),
        };

        let address = Address::from_str(address).map_err(|_| InvalidDid(s.to_string()))?;

        Ok(Did {
            method: parts[1].to_string(),
            network,
            address,
        })
    }
}

/// Builds the identifier string for a public key.
///
/// # Arguments
/// * `method` - DID method name
/// * `network` - Target network; mainnet omits the network segment
/// * `public_key` - secp256k1 public key of the controlling account
///
/// # Returns
/// Identifier such as `did:polygon:testnet:0x138d2231e4362fc0e028576Fb2DF56904bd59C1b`
pub fn build_did(method: &str, network: Network, public_key: &VerifyingKey) -> String {
    Did::from_public_key(method, network, public_key).to_string()
}

/// A public key descriptor bound to a DID.
///
/// Every field is defaulted on input so that incomplete methods survive
/// deserialization and are reported by the validator instead.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct VerificationMethod {
    /// `<did>#key-<n>`
    pub id: String,

    /// Verification method type, e.g. `EcdsaSecp256k1VerificationKey2019`
    #[serde(rename = "type")]
    pub type_: String,

    /// DID that controls this key
    pub controller: String,

    /// base58 of the uncompressed public key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_base58: Option<String>,
}

/// A service endpoint advertised by a DID.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Service {
    pub id: String,

    #[serde(rename = "type")]
    pub type_: String,

    pub service_endpoint: String,
}

/// A DID Document as anchored on the registry contract.
///
/// `verification_method` and `service` are optional so that the validator
/// can tell "absent" apart from "empty". Relationship lists hold method ids.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    #[serde(
        rename = "@context",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub context: Vec<String>,

    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<Vec<VerificationMethod>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authentication: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertion_method: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capability_delegation: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capability_invocation: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_agreement: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Vec<Service>>,
}

impl DidDocument {
    /// Minimal document carrying only the identifier and base context.
    ///
    /// Written over the anchored document to deactivate a DID.
    pub fn deactivated_stub(did: &str) -> Self {
        DidDocument {
            context: vec![DID_CONTEXT.to_string()],
            id: did.to_string(),
            ..Default::default()
        }
    }

    /// Verification methods, empty when absent.
    pub fn verification_methods(&self) -> &[VerificationMethod] {
        self.verification_method.as_deref().unwrap_or(&[])
    }

    /// A document without verification methods is the deactivation marker.
    pub fn is_deactivated(&self) -> bool {
        self.verification_methods().is_empty()
    }

    /// `publicKeyBase58` of the first verification method, i.e. the key that
    /// controls the document on the ledger.
    pub fn controlling_key_id(&self) -> Option<&str> {
        self.verification_methods()
            .first()
            .and_then(|vm| vm.public_key_base58.as_deref())
    }
}
