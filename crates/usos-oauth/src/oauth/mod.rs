//! OAuth 1.0a HMAC-SHA1 request signing.
//!
//! The ERP only accepts HMAC-SHA1 signed requests with the three-legged
//! flow (request token, user authorization, access token).

mod signature;

#[cfg(any(test, feature = "mock"))]
pub use signature::parse_authorization_header;
pub use signature::{
    OAuthParams, SIGNATURE_METHOD, build_signature_base_string, create_authorization_header,
    oauth_encode, sign,
};

use serde::{Deserialize, Serialize};

/// Temporary credentials from request token phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestToken {
    pub oauth_token: String,
    pub oauth_token_secret: String,
}

/// Final access credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub oauth_token: String,
    pub oauth_token_secret: String,
}
