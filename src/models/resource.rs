// src/models/resource.rs
//! Linked Resource data model.
//!
//! A linked resource is a versioned artifact (typically a credential schema)
//! owned by a DID's account on the resource registry contract. Versions of the
//! same resource form a chain through `previous_version_id` / `next_version_id`.

use serde::{Deserialize, Serialize};

/// Resource metadata as stored on the resource registry.
///
/// All ten fields are always serialized; version links are `null` when absent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LinkedResource {
    /// `<did>/resources/<resourceId>`
    #[serde(rename = "resourceURI")]
    pub resource_uri: String,

    /// Address of the owning DID
    pub resource_collection_id: String,

    /// UUID v4 assigned at creation
    pub resource_id: String,

    pub resource_name: String,

    /// e.g. `W3C-schema`
    pub resource_type: String,

    pub media_type: String,

    /// RFC 3339 creation time
    pub created: String,

    /// Hex SHA-256 of the resource content
    pub checksum: String,

    pub previous_version_id: Option<String>,

    pub next_version_id: Option<String>,
}

impl LinkedResource {
    /// Two resources are versions of each other when name and type agree.
    pub fn same_series(&self, resource_name: &str, resource_type: &str) -> bool {
        self.resource_name == resource_name && self.resource_type == resource_type
    }

    /// Identifier that owns this resource, taken from `resourceURI`.
    pub fn owner_did(&self) -> Option<&str> {
        self.resource_uri.split_once("/resources/").map(|(did, _)| did)
    }

    /// The latest version of a series has no successor.
    pub fn is_latest(&self) -> bool {
        self.next_version_id.as_deref().map_or(true, str::is_empty)
    }
}

/// Caller-supplied input for a new resource version.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePayload {
    pub resource_name: String,

    pub resource_type: String,

    #[serde(default = "default_media_type")]
    pub media_type: String,

    /// Resource body; only its checksum is anchored
    pub content: serde_json::Value,
}

fn default_media_type() -> String {
    "application/json".to_string()
}

/// Outcome of `add_resource`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddedResource {
    pub resource_id: String,
    pub txn_hash: ethers::types::H256,
    pub resource: LinkedResource,
    /// Earlier versions whose `nextVersionId` could not be written. They are
    /// relinked by the next addition to the same series.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unlinked_version_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_all_keys_in_order() {
        let resource = LinkedResource {
            resource_uri: "did:polygon:0xabc/resources/1".into(),
            resource_collection_id: "0xabc".into(),
            resource_id: "1".into(),
            resource_name: "PAN CARD".into(),
            resource_type: "W3C-schema".into(),
            media_type: "application/json".into(),
            created: "2024-01-01T00:00:00Z".into(),
            checksum: "00".into(),
            previous_version_id: None,
            next_version_id: None,
        };

        let value = serde_json::to_value(&resource).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        let mut expected = vec![
            "resourceURI",
            "resourceCollectionId",
            "resourceId",
            "resourceName",
            "resourceType",
            "mediaType",
            "created",
            "checksum",
            "previousVersionId",
            "nextVersionId",
        ];
        expected.sort();
        let mut keys = keys;
        keys.sort();
        assert_eq!(keys, expected);
        assert!(resource.is_latest());
    }

    #[test]
    fn test_payload_defaults_media_type() {
        let payload: ResourcePayload = serde_json::from_str(
            r#"{"resourceName":"PAN CARD","resourceType":"W3C-schema","content":{}}"#,
        )
        .unwrap();
        assert_eq!(payload.media_type, "application/json");
    }
}
