//! OAuth 2.1 client plumbing
//!
//! Discovery, dynamic client registration, PKCE and the token endpoint calls
//! used by [`AuthorizationProvider`](crate::auth::AuthorizationProvider).

mod discovery;
mod flow;
mod pkce;
mod registration;
mod token;

pub use discovery::{DiscoveredServer, OAuthDiscovery, OAuthMetadata, ProtectedResourceMetadata};
pub use flow::OAuthFlow;
pub use pkce::PkceChallenge;
pub use registration::register_client;
pub use token::TokenResponse;
