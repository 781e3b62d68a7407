// src/wallet/mod.rs
//! Key material management.

pub mod key_management;
