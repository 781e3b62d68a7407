// src/lib.rs
//! # Polygon DID Registrar
//!
//! Creates, updates and deactivates ledger-anchored DIDs of the form
//! `did:polygon[:testnet]:0x<address>`, and publishes versioned linked
//! resources under a DID's account.
//!
//! ## Layers
//! 1. **Blockchain**: [`blockchain::ledger_client::LedgerClient`] over an EVM JSON-RPC node
//! 2. **Contracts**: DID registry and resource registry wrappers
//! 3. **DID**: document builder, validator and resolver
//! 4. **Services**: lifecycle registrar, resource service and HTTP API
//! 5. **Storage / Wallet**: local DID records and key management

pub mod blockchain;
pub mod config;
pub mod contracts;
pub mod did;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
mod testing;
