//! HTTP transport seam between the signing client and the network.
//!
//! [`UreqTransport`] performs real blocking requests; [`MockTransport`]
//! (behind the `mock` feature) replays scripted responses and records
//! every request it receives.

use std::time::Duration;

use ureq::Agent;

use crate::error::TransportError;
use crate::oauth::oauth_encode;

/// Fallback content type when the ERP omits the header.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// A signed outbound GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErpRequest {
    /// URL without query string.
    pub url: String,
    /// Query parameters, unencoded.
    pub query: Vec<(String, String)>,
    /// `Authorization` header value.
    pub authorization: String,
}

impl ErpRequest {
    /// Full URL with the percent-encoded query string.
    #[must_use]
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", oauth_encode(k), oauth_encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.url)
    }

    /// First value of a query parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Response received from the ERP, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErpResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, if the ERP sent one.
    pub content_type: Option<String>,
    /// Raw body bytes.
    pub body: Vec<u8>,
}

impl ErpResponse {
    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Executes signed requests.
pub trait Transport: Send + Sync {
    /// Perform a GET request and return the response for any status.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if no response could be obtained.
    fn get(&self, request: &ErpRequest) -> Result<ErpResponse, TransportError>;
}

/// Blocking transport backed by a shared `ureq` agent.
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    /// Create a transport whose requests end after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn get(&self, request: &ErpRequest) -> Result<ErpResponse, TransportError> {
        let response = self
            .agent
            .get(&request.full_url())
            .header("Authorization", &request.authorization)
            .call()?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.into_body().read_to_vec()?;

        Ok(ErpResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockTransport;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::{ErpRequest, ErpResponse, Transport};
    use crate::error::TransportError;

    /// Transport replaying scripted responses in order.
    ///
    /// When the script runs out, requests fail with
    /// [`TransportError::Unreachable`].
    ///
    /// # Example
    ///
    /// ```ignore
    /// let transport = MockTransport::new()
    ///     .with_form(200, "oauth_token=t&oauth_token_secret=s")
    ///     .with_json(200, r#"{"id":"42"}"#);
    /// ```
    #[derive(Debug, Default)]
    pub struct MockTransport {
        script: Mutex<VecDeque<Result<ErpResponse, TransportError>>>,
        requests: Mutex<Vec<ErpRequest>>,
    }

    impl MockTransport {
        /// Create a mock with an empty script.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue an arbitrary response.
        ///
        /// # Panics
        ///
        /// Panics if the internal lock is poisoned.
        #[must_use]
        pub fn with_response(self, status: u16, content_type: Option<&str>, body: &str) -> Self {
            self.script.lock().unwrap().push_back(Ok(ErpResponse {
                status,
                content_type: content_type.map(str::to_owned),
                body: body.as_bytes().to_vec(),
            }));
            self
        }

        /// Queue a JSON response.
        #[must_use]
        pub fn with_json(self, status: u16, body: &str) -> Self {
            self.with_response(status, Some("application/json"), body)
        }

        /// Queue a form-encoded response, as returned by the token endpoints.
        #[must_use]
        pub fn with_form(self, status: u16, body: &str) -> Self {
            self.with_response(status, Some("application/x-www-form-urlencoded"), body)
        }

        /// Queue a transport failure.
        ///
        /// # Panics
        ///
        /// Panics if the internal lock is poisoned.
        #[must_use]
        pub fn with_error(self, error: TransportError) -> Self {
            self.script.lock().unwrap().push_back(Err(error));
            self
        }

        /// All requests received so far.
        ///
        /// # Panics
        ///
        /// Panics if the internal lock is poisoned.
        #[must_use]
        pub fn requests(&self) -> Vec<ErpRequest> {
            self.requests.lock().unwrap().clone()
        }

        /// Number of requests received so far.
        #[must_use]
        pub fn request_count(&self) -> usize {
            self.requests().len()
        }
    }

    impl Transport for MockTransport {
        fn get(&self, request: &ErpRequest) -> Result<ErpResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Unreachable("no scripted response".into())))
        }
    }
}
