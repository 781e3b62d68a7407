// src/storage/mod.rs
//! Local storage layer.

pub mod record_store;
