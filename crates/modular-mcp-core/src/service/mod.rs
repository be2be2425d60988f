//! Config services: loading modular configs and migrating standard ones

mod config_loader;
pub mod migrate;

pub use config_loader::{load_config, parse_config};
