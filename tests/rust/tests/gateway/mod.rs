//! Gateway integration tests
//!
//! Interactive lock ordering, callback listener lifecycle, the startup sweep
//! and the unauthorized-then-authorize retry.

mod authorization;
mod interactive_lock;
mod session_manager;
