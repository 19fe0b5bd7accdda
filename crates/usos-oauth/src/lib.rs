//! OAuth 1.0a client for the USOS university API.
//!
//! This crate provides:
//! - [`oauth`]: HMAC-SHA1 request signing (RFC 5849)
//! - [`ErpClient`]: the three handshake legs, identity lookup and signed
//!   resource calls
//! - [`Transport`]: the HTTP seam, with [`UreqTransport`] for real traffic
//!   and `MockTransport` for tests (behind the `mock` feature)
//! - [`quirks`]: scope lists, `fields` fallback profiles and date windows
//!
//! # Example
//!
//! ```ignore
//! use usos_oauth::ErpClient;
//!
//! let client = ErpClient::from_config(config.require_usos()?);
//! let request_token = client.request_token(&callback_url, &scopes)?;
//! let url = client.authorization_url(&request_token, &scopes);
//! // ... user approves, USOS redirects back with a verifier ...
//! let access_token = client.exchange_verifier(&request_token, &verifier)?;
//! let identity = client.fetch_identity(&access_token)?;
//! ```

mod client;
mod error;
pub mod oauth;
pub mod quirks;
mod transport;

pub use client::{ErpClient, Identity};
pub use error::{OAuthError, TransportError};
pub use oauth::{AccessToken, RequestToken};
#[cfg(any(test, feature = "mock"))]
pub use transport::MockTransport;
pub use transport::{DEFAULT_CONTENT_TYPE, ErpRequest, ErpResponse, Transport, UreqTransport};
