//! USOS API client.
//!
//! Provides the three OAuth legs and signed resource calls on top of a
//! [`Transport`]. Every call is blocking; async callers run them on a
//! blocking thread.

mod handshake;
mod resources;

pub use handshake::Identity;

use std::sync::Arc;
use std::time::Duration;

use usos_config::UsosConfig;

use crate::error::TransportError;
use crate::oauth::{OAuthParams, create_authorization_header};
use crate::transport::{ErpRequest, ErpResponse, Transport, UreqTransport};

/// USOS API client holding the consumer credentials.
pub struct ErpClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    consumer_key: String,
    consumer_secret: String,
    scopes_signed: bool,
}

impl ErpClient {
    /// Create a client over an arbitrary transport.
    ///
    /// # Arguments
    /// * `base_url` - USOS base URL (without `/services`)
    /// * `consumer_key` - OAuth consumer key
    /// * `consumer_secret` - OAuth consumer secret
    /// * `transport` - Transport executing the signed requests
    #[must_use]
    pub fn new(
        base_url: &str,
        consumer_key: &str,
        consumer_secret: &str,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_owned(),
            consumer_key: consumer_key.to_owned(),
            consumer_secret: consumer_secret.to_owned(),
            scopes_signed: true,
        }
    }

    /// Create a `ureq`-backed client from validated config.
    #[must_use]
    pub fn from_config(config: &UsosConfig) -> Self {
        let transport = UreqTransport::new(Duration::from_secs(config.timeout_secs));
        Self::new(
            &config.base_url,
            &config.consumer_key,
            &config.consumer_secret,
            Arc::new(transport),
        )
        .with_scopes_signed(config.scopes_signed)
    }

    /// Choose whether `scopes` is part of the signature base string.
    ///
    /// When `false` the parameter is still sent in the query string.
    #[must_use]
    pub fn with_scopes_signed(mut self, scopes_signed: bool) -> Self {
        self.scopes_signed = scopes_signed;
        self
    }

    /// Get the services base URL.
    fn services_url(&self) -> String {
        format!("{}/services", self.base_url)
    }

    /// Absolute URL for a resource path relative to `services/`.
    #[must_use]
    pub fn resource_url(&self, path: &str) -> String {
        format!("{}/{}", self.services_url(), path.trim_start_matches('/'))
    }

    /// Protocol parameters for a new request.
    fn oauth_params(&self) -> OAuthParams {
        OAuthParams::new(&self.consumer_key)
    }

    /// Sign and send a GET request.
    ///
    /// `params` travel in the query string. All of them are signed, except
    /// `scopes` when scope signing is disabled.
    fn send_signed(
        &self,
        url: String,
        params: Vec<(String, String)>,
        oauth: &OAuthParams,
        token_secret: &str,
    ) -> Result<ErpResponse, TransportError> {
        let signed: Vec<(String, String)> = params
            .iter()
            .filter(|(k, _)| self.scopes_signed || k != "scopes")
            .cloned()
            .collect();

        let authorization = create_authorization_header(
            "GET",
            &url,
            &signed,
            oauth,
            &self.consumer_secret,
            token_secret,
        );

        let request = ErpRequest {
            url,
            query: params,
            authorization,
        };
        tracing::debug!(url = %request.url, "Sending signed USOS request");
        self.transport.get(&request)
    }
}
