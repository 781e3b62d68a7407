// src/config.rs
//! Runtime configuration.
//!
//! Settings are layered, later sources winning:
//! 1. Built-in defaults
//! 2. `config/default.toml` (optional)
//! 3. Environment variables prefixed with `POLYGON_DID_`, e.g.
//!    `POLYGON_DID_RPC_URL`, `POLYGON_DID_DID_CONTRACT_ADDRESS`
//!
//! A `.env` file in the working directory is loaded into the environment first.

use crate::models::did::Network;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;

const DEFAULT_RPC_URL: &str = "https://rpc-amoy.polygon.technology";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Ledger JSON-RPC endpoint
    pub rpc_url: String,
    /// Address of the DID registry contract
    pub did_contract_address: String,
    /// Address of the resource registry contract, defaults to the DID registry
    #[serde(default)]
    pub resource_contract_address: Option<String>,
    #[serde(default)]
    pub network: Network,
    pub listen_addr: SocketAddr,
    /// JSON file for DID records; records are kept in memory when unset
    #[serde(default)]
    pub record_store_path: Option<String>,
}

impl Settings {
    /// Loads settings from `.env`, `config/default.toml` and the environment.
    ///
    /// # Errors
    /// Returns error if a required value (the DID contract address) is missing
    /// or a value has the wrong shape.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name("config/default").required(false))
                .add_source(Environment::with_prefix("POLYGON_DID")),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        builder
            .set_default("rpc_url", DEFAULT_RPC_URL)?
            .set_default("listen_addr", DEFAULT_LISTEN_ADDR)?
            .build()?
            .try_deserialize()
    }

    /// Resource registry address, falling back to the DID registry.
    pub fn resource_contract_address(&self) -> &str {
        self.resource_contract_address
            .as_deref()
            .unwrap_or(&self.did_contract_address)
    }
}
