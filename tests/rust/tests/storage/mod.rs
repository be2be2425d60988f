//! Credential store integration tests
