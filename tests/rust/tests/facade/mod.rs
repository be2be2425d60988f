//! End-to-end tests of the two proxy tools over a real MCP session

mod proxy;
