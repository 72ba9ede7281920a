//! Security module
//!
//! Credential storage for the model backend.

pub mod keyring;

pub use keyring::{delete_api_key, resolve_api_key, set_api_key};
