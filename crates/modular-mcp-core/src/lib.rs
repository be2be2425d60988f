//! # Modular MCP Core Library
//!
//! Domain types and repository traits shared by the gateway and storage crates.
//!
//! ## Modules
//!
//! - `branding` - Product naming, file names and OAuth client identity
//! - `domain` - Server configuration, environment substitution and credentials
//! - `repository` - Data access traits
//! - `service` - Config loading and the migrate transform

pub mod branding;
pub mod domain;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use domain::*;
pub use repository::*;
pub use service::*;
