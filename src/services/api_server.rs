// src/services/api_server.rs
//! HTTP API for the DID registrar.
//!
//! Exposes the lifecycle registrar and the linked resource service over REST:
//! - `POST   /dids`                              create a DID
//! - `GET    /dids/:did`                         resolve a DID
//! - `PUT    /dids/:did`                         update a DID document
//! - `DELETE /dids/:did`                         deactivate a DID
//! - `POST   /dids/:did/resources`               add a linked resource version
//! - `GET    /dids/:did/resources`               list linked resources
//! - `GET    /dids/:did/resources/:resource_id`  fetch one linked resource
//! - `POST   /estimate-fee`                      dry-run a DID or resource registry call
//!
//! Lifecycle endpoints always answer with a [`DidOperationResult`]; a
//! `failed` state maps to 400 Bad Request.

use crate::did::resolver::ERROR_NOT_FOUND;
use crate::did::validator::validate_json;
use crate::error::RegistrarError;
use crate::models::did::{Did, DidDocument, Network, DEFAULT_DID_METHOD};
use crate::models::registration::DidOperationResult;
use crate::models::resource::ResourcePayload;
use crate::services::registrar::{CreateOptions, DidRegistrar, ERROR_INVALID_PRIVATE_KEY};
use crate::services::resource_service::ResourceLedgerService;
use crate::wallet::key_management::parse_private_key_hex;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use ethers::abi::Token;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

// API request structures

/// Request payload for creating a new DID
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreateDidRequest {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Hex encoded private key, with or without `0x`
    pub private_key: String,
}

/// Request payload for updating an existing DID
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDidRequest {
    /// Raw document, checked with [`validate_json`] before it is typed
    #[serde(default)]
    pub did_document: Option<Value>,
    /// Additional key to append as a verification method
    #[serde(default)]
    pub private_key: Option<String>,
}

/// Request payload for adding a linked resource
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AddResourceRequest {
    /// Key identifier of the DID's controlling key
    pub key_id: String,
    #[serde(flatten)]
    pub resource: ResourcePayload,
}

/// Registry a fee estimate is computed against
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeeRegistry {
    #[default]
    Did,
    Resource,
}

/// Request payload for a registry fee estimate
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EstimateFeeRequest {
    #[serde(default)]
    pub registry: FeeRegistry,
    /// Registry method, e.g. `createDID`, `updateDIDDoc`, `addResource`
    pub method: String,
    pub did: String,
    #[serde(default)]
    pub did_document: Option<DidDocument>,
    /// Only read for the resource registry
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Only read for the resource registry
    #[serde(default)]
    pub resource: Option<ResourcePayload>,
}

fn decode_private_key(private_key: &str) -> Result<Vec<u8>, Response> {
    parse_private_key_hex(private_key)
        .map(|key| key.to_bytes().to_vec())
        .map_err(|_| operation_response(DidOperationResult::failed(ERROR_INVALID_PRIVATE_KEY)))
}

fn operation_response(result: DidOperationResult) -> Response {
    let status = if result.is_finished() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(result)).into_response()
}

fn error_response(err: RegistrarError) -> Response {
    let status = match &err {
        RegistrarError::InvalidDid(_)
        | RegistrarError::InvalidResource(_)
        | RegistrarError::SigningKeyNotFound(_) => StatusCode::BAD_REQUEST,
        RegistrarError::ResourceNotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

/// Main API server structure
#[derive(Clone)]
pub struct ApiServer {
    registrar: Arc<DidRegistrar>,
    resources: Arc<ResourceLedgerService>,
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `registrar` - DID lifecycle registrar
    /// * `resources` - Linked resource service
    pub fn new(registrar: DidRegistrar, resources: ResourceLedgerService) -> Self {
        ApiServer {
            registrar: Arc::new(registrar),
            resources: Arc::new(resources),
        }
    }

    /// Builds the router with every API route
    pub fn router(&self) -> Router {
        Router::new()
            .route("/dids", post(Self::create_did_handler))
            .route(
                "/dids/:did",
                get(Self::resolve_did_handler)
                    .put(Self::update_did_handler)
                    .delete(Self::deactivate_did_handler),
            )
            .route(
                "/dids/:did/resources",
                post(Self::add_resource_handler).get(Self::list_resources_handler),
            )
            .route(
                "/dids/:did/resources/:resource_id",
                get(Self::get_resource_handler),
            )
            .route("/estimate-fee", post(Self::estimate_fee_handler))
            .with_state(Arc::new(self.clone()))
    }

    /// Starts the API server and begins listening for requests
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:3000")
    pub async fn run(&self, addr: SocketAddr) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API server listening on {}", addr);

        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    // =====================
    // DID Lifecycle Handlers
    // =====================

    /// Creates a new DID
    ///
    /// # Endpoint
    /// POST /dids
    ///
    /// # Responses
    /// - 200 OK: `finished` state with the anchored document
    /// - 400 Bad Request: `failed` state with the reason
    async fn create_did_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<CreateDidRequest>,
    ) -> Response {
        let private_key = match decode_private_key(&payload.private_key) {
            Ok(private_key) => private_key,
            Err(response) => return response,
        };
        let options = CreateOptions {
            method: payload
                .method
                .unwrap_or_else(|| DEFAULT_DID_METHOD.to_string()),
            network: payload.network,
            endpoint: payload.endpoint,
            private_key,
        };

        operation_response(state.registrar.create(options).await)
    }

    /// Resolves a DID to its published document
    ///
    /// # Endpoint
    /// GET /dids/:did
    ///
    /// # Responses
    /// - 200 OK: document and `deactivated` flag
    /// - 400 Bad Request: malformed identifier
    /// - 404 Not Found: nothing anchored for the identifier
    async fn resolve_did_handler(
        State(state): State<Arc<ApiServer>>,
        Path(did): Path<String>,
    ) -> Response {
        let resolution = match state.registrar.resolve(&did).await {
            Ok(resolution) => resolution,
            Err(e) => return error_response(e),
        };

        let status = match resolution.error.as_deref() {
            None => StatusCode::OK,
            Some(ERROR_NOT_FOUND) => StatusCode::NOT_FOUND,
            Some(_) => StatusCode::BAD_REQUEST,
        };
        let body = json!({
            "didDocument": resolution.did_document,
            "didDocumentMetadata": { "deactivated": resolution.deactivated },
            "didResolutionMetadata": { "error": resolution.error },
        });
        (status, Json(body)).into_response()
    }

    /// Replaces the document of a DID
    ///
    /// # Endpoint
    /// PUT /dids/:did
    async fn update_did_handler(
        State(state): State<Arc<ApiServer>>,
        Path(did): Path<String>,
        Json(payload): Json<UpdateDidRequest>,
    ) -> Response {
        let document = match payload.did_document.as_ref().map(validate_json).transpose() {
            Ok(document) => document,
            Err(invalid) => return operation_response(DidOperationResult::failed(invalid.to_string())),
        };
        let private_key = match payload.private_key.as_deref().map(decode_private_key).transpose() {
            Ok(private_key) => private_key,
            Err(response) => return response,
        };

        operation_response(state.registrar.update(&did, document, private_key).await)
    }

    /// Deactivates a DID
    ///
    /// # Endpoint
    /// DELETE /dids/:did
    async fn deactivate_did_handler(
        State(state): State<Arc<ApiServer>>,
        Path(did): Path<String>,
    ) -> Response {
        operation_response(state.registrar.deactivate(&did).await)
    }

    // =====================
    // Linked Resource Handlers
    // =====================

    /// Adds a new resource version
    ///
    /// # Endpoint
    /// POST /dids/:did/resources
    async fn add_resource_handler(
        State(state): State<Arc<ApiServer>>,
        Path(did): Path<String>,
        Json(payload): Json<AddResourceRequest>,
    ) -> Response {
        match state
            .resources
            .add_resource(&did, &payload.key_id, payload.resource)
            .await
        {
            Ok(added) => (StatusCode::OK, Json(added)).into_response(),
            Err(e) => error_response(e),
        }
    }

    /// Lists every resource of a DID, oldest first
    ///
    /// # Endpoint
    /// GET /dids/:did/resources
    async fn list_resources_handler(
        State(state): State<Arc<ApiServer>>,
        Path(did): Path<String>,
    ) -> Response {
        match state.resources.get_all_resources_by_did(&did).await {
            Ok(resources) => (StatusCode::OK, Json(resources)).into_response(),
            Err(e) => error_response(e),
        }
    }

    /// Fetches a single resource
    ///
    /// # Endpoint
    /// GET /dids/:did/resources/:resource_id
    async fn get_resource_handler(
        State(state): State<Arc<ApiServer>>,
        Path((did, resource_id)): Path<(String, String)>,
    ) -> Response {
        match state
            .resources
            .get_resource_by_did_and_id(&did, &resource_id)
            .await
        {
            Ok(resource) => (StatusCode::OK, Json(resource)).into_response(),
            Err(e) => error_response(e),
        }
    }

    // =====================
    // Fee Estimation
    // =====================

    /// Estimates the cost of a registry write
    ///
    /// # Endpoint
    /// POST /estimate-fee
    ///
    /// `registry` selects the DID registry (default) or the resource registry.
    async fn estimate_fee_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<EstimateFeeRequest>,
    ) -> Response {
        let did: Did = match payload.did.parse() {
            Ok(did) => did,
            Err(e) => return error_response(RegistrarError::InvalidDid(e)),
        };

        let estimate = match payload.registry {
            FeeRegistry::Did => {
                let document = payload
                    .did_document
                    .unwrap_or_else(|| DidDocument::deactivated_stub(&payload.did));
                let document_json = match serde_json::to_string(&document) {
                    Ok(json) => json,
                    Err(e) => return error_response(e.into()),
                };
                let args = [Token::Address(did.address), Token::String(document_json)];
                state.registrar.estimate_fee(&payload.method, &args).await
            }
            FeeRegistry::Resource => {
                let resource_json = match payload.resource.as_ref().map(serde_json::to_string).transpose() {
                    Ok(json) => json.unwrap_or_else(|| "{}".to_string()),
                    Err(e) => return error_response(e.into()),
                };
                let args = [
                    Token::Address(did.address),
                    Token::String(payload.resource_id.unwrap_or_default()),
                    Token::String(resource_json),
                ];
                state.resources.estimate_fee(&payload.method, &args).await
            }
        };

        match estimate {
            Ok(estimate) => (StatusCode::OK, Json(estimate)).into_response(),
            Err(e) => error_response(e),
        }
    }
}
