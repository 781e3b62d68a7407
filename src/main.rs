// src/main.rs

//! # Polygon DID Registrar - Main Entry Point
//!
//! Wires the ledger client, registry contracts, key and record stores into the
//! registrar and serves the HTTP API.
//!
//! ## Configuration
//! See [`polygon_did_registrar::config::Settings`]. The only required value is
//! `POLYGON_DID_DID_CONTRACT_ADDRESS`.

use anyhow::Context;
use log::info;
use polygon_did_registrar::blockchain::ledger_client::LedgerClient;
use polygon_did_registrar::config::Settings;
use polygon_did_registrar::contracts::did_registry::DidRegistryContract;
use polygon_did_registrar::contracts::resource_registry::ResourceRegistryContract;
use polygon_did_registrar::did::resolver::LedgerDidResolver;
use polygon_did_registrar::services::api_server::ApiServer;
use polygon_did_registrar::services::registrar::DidRegistrar;
use polygon_did_registrar::services::resource_service::ResourceLedgerService;
use polygon_did_registrar::storage::record_store::{
    DidRecordStore, InMemoryDidRecordStore, JsonFileDidRecordStore,
};
use polygon_did_registrar::wallet::key_management::{InMemoryKeyStore, KeyManager};
use std::sync::Arc;

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load configuration
/// 2. Connect to the ledger
/// 3. Initialize contracts, stores and services
/// 4. Start API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load().context("Failed to load configuration")?;

    let client = Arc::new(
        LedgerClient::new(&settings.rpc_url)
            .await
            .context("Failed to connect to ledger")?,
    );

    let did_registry = Arc::new(DidRegistryContract::new(
        client.clone(),
        &settings.did_contract_address,
        settings.network,
    )?);
    let resource_registry = Arc::new(ResourceRegistryContract::new(
        client.clone(),
        settings.resource_contract_address(),
        settings.network,
    )?);

    let records: Arc<dyn DidRecordStore> = match &settings.record_store_path {
        Some(path) => {
            info!("Persisting DID records to {}", path);
            Arc::new(JsonFileDidRecordStore::new(path))
        }
        None => Arc::new(InMemoryDidRecordStore::new()),
    };

    let keys = KeyManager::new(Arc::new(InMemoryKeyStore::new()));
    let registrar = DidRegistrar::new(
        keys.clone(),
        did_registry.clone(),
        Arc::new(LedgerDidResolver::new(did_registry)),
        records,
    );
    let resources = ResourceLedgerService::new(resource_registry, keys);

    info!(
        "Registrar ready on {} ({} network, methods {:?})",
        client.network(),
        settings.network,
        registrar.supported_methods()
    );

    ApiServer::new(registrar, resources)
        .run(settings.listen_addr)
        .await
}
