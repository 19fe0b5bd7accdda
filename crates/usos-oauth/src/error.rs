//! Error types for USOS API access.

/// Failure to get any HTTP response from the ERP.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection, DNS, TLS or I/O failure.
    #[error("USOS unreachable: {0}")]
    Unreachable(String),

    /// The configured timeout elapsed.
    #[error("USOS request timed out")]
    Timeout,
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Timeout(_) => Self::Timeout,
            other => Self::Unreachable(other.to_string()),
        }
    }
}

/// Error from the OAuth handshake legs and identity lookup.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// The ERP answered with a non-success status.
    #[error("USOS rejected the request: {status} - {body}")]
    RemoteRejected {
        /// HTTP status code.
        status: u16,
        /// Response body (may contain error details).
        body: String,
    },

    /// The response body could not be interpreted.
    #[error("Malformed USOS response: {0}")]
    MalformedResponse(String),

    /// The identity response carried no user id.
    #[error("USOS identity response has no user id")]
    IdentityMissing,

    /// No response was received.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl OAuthError {
    /// Whether the failure happened before any response arrived.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
