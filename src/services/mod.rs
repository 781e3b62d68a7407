// src/services/mod.rs
//! Business logic and API layer.

pub mod api_server;
pub mod registrar;
pub mod resource_service;
