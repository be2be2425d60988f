//! OAuth protocol tests against a mock authorization server

mod discovery;
