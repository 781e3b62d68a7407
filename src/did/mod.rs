// src/did/mod.rs
//! DID Document building, validation and resolution.

pub mod builder;
pub mod resolver;
pub mod validator;
