// src/contracts/mod.rs
//! Smart contract bindings for the DID and resource registries.

pub mod did_registry;
pub mod resource_registry;
