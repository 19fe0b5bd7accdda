//! Application state.
//!
//! Shared state for all request handlers.

use std::sync::Arc;

use usos_oauth::quirks::WindowPolicy;
use usos_oauth::{ErpClient, TransportError};
use usos_store::Store;

use crate::session::SessionCookies;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Signing USOS client.
    pub(crate) erp: Arc<ErpClient>,
    /// User and credential storage.
    pub(crate) store: Arc<dyn Store>,
    /// Session cookie codec.
    pub(crate) sessions: SessionCookies,
    /// Exact OAuth callback URL registered with USOS.
    pub(crate) callback_url: String,
    /// Frontend landing page.
    pub(crate) frontend_url: String,
    /// Scopes requested when the client does not choose any.
    pub(crate) default_scopes: Vec<String>,
    /// Append stored scopes to proxied requests.
    pub(crate) proxy_append_scopes: bool,
    /// Date-window ceiling for timetable endpoints.
    pub(crate) window: WindowPolicy,
}

impl AppState {
    /// Run a blocking USOS call off the async runtime.
    ///
    /// Dropping the returned future stops waiting; the call itself ends at
    /// the latest when the transport timeout fires.
    pub(crate) async fn call_erp<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&ErpClient) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<TransportError> + Send + 'static,
    {
        let erp = Arc::clone(&self.erp);
        tokio::task::spawn_blocking(move || f(&erp))
            .await
            .unwrap_or_else(|e| {
                Err(TransportError::Unreachable(format!("USOS call aborted: {e}")).into())
            })
    }

    /// Frontend URL carrying an error tag.
    pub(crate) fn frontend_error_url(&self, tag: &str) -> String {
        format!("{}/?error={tag}", self.frontend_url.trim_end_matches('/'))
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use usos_oauth::MockTransport;
    use usos_store::MemoryStore;

    use super::test_support::state_with;

    #[test]
    fn test_frontend_error_url() {
        let state = state_with(
            &Arc::new(MockTransport::new()),
            &Arc::new(MemoryStore::new()),
        );
        assert_eq!(
            state.frontend_error_url("session_expired"),
            "http://frontend.test/?error=session_expired"
        );
    }
}
