// src/models/mod.rs
//! Data structures shared by the services.

pub mod did;
pub mod registration;
pub mod resource;
