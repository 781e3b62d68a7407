// src/blockchain/mod.rs
//! Ledger transport: RPC provider, signing, fee estimation.

pub mod ledger_client;
