//! Three-legged login flow.
//!
//! [`begin`] obtains a request token and the USOS authorization URL.
//! [`complete`] validates the callback against the pending handshake,
//! exchanges the verifier, resolves the identity and persists the user and
//! credential. Nothing is persisted unless every step succeeds.

use axum::http::StatusCode;
use usos_oauth::{OAuthError, RequestToken, quirks::join_scopes};
use usos_store::{NewCredential, NewUser, StoreError, User};

use crate::session::PendingHandshake;
use crate::state::AppState;

/// A started login: what to keep in the session and where to send the user.
#[derive(Debug)]
pub(crate) struct LoginStart {
    pub(crate) pending: PendingHandshake,
    pub(crate) authorization_url: String,
}

/// Why a login could not start or complete.
#[derive(Debug, thiserror::Error)]
pub(crate) enum FlowError {
    /// USOS did not issue a request token.
    #[error("request token failed: {0}")]
    RequestToken(#[source] OAuthError),

    /// No pending handshake, or the callback belongs to a superseded one.
    #[error("login session expired")]
    SessionExpired,

    /// A required callback parameter is missing.
    #[error("callback is missing {0}")]
    MalformedCallback(&'static str),

    /// The verifier exchange failed.
    #[error("access token exchange failed: {0}")]
    Exchange(#[source] OAuthError),

    /// The identity lookup failed.
    #[error("identity lookup failed: {0}")]
    Identity(#[source] OAuthError),

    /// Persisting the user or credential failed.
    #[error("persisting login failed: {0}")]
    Store(#[from] StoreError),
}

impl FlowError {
    /// Error tag reported to the frontend.
    pub(crate) fn tag(&self) -> &'static str {
        match self {
            Self::SessionExpired => "session_expired",
            Self::MalformedCallback(_) => "invalid_callback",
            Self::RequestToken(e) | Self::Exchange(e) | Self::Identity(e)
                if e.is_transport() =>
            {
                "upstream_unreachable"
            }
            Self::RequestToken(_) | Self::Exchange(_) => "auth_failed",
            Self::Identity(OAuthError::IdentityMissing) => "identity_missing",
            Self::Identity(_) => "user_info_failed",
            Self::Store(_) => "db_failed",
        }
    }

    /// Status used when the error is returned as JSON.
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::SessionExpired | Self::Exchange(OAuthError::RemoteRejected { .. }) => {
                StatusCode::UNAUTHORIZED
            }
            Self::MalformedCallback(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RequestToken(_) | Self::Exchange(_) | Self::Identity(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    /// Fixed user-facing message for the tag. USOS response bodies stay in
    /// the log.
    pub(crate) fn message(&self) -> &'static str {
        match self.tag() {
            "session_expired" => "Login session expired, start again",
            "invalid_callback" => "Login callback is incomplete",
            "upstream_unreachable" => "USOS is unreachable",
            "identity_missing" => "USOS did not return a user id",
            "user_info_failed" => "Could not read the USOS user profile",
            "db_failed" => "Could not save the login",
            _ => "USOS rejected the login",
        }
    }
}

/// Start a login for the given scopes.
///
/// # Errors
///
/// Returns [`FlowError::RequestToken`] if USOS does not issue a request
/// token.
pub(crate) async fn begin(state: &AppState, scopes: Vec<String>) -> Result<LoginStart, FlowError> {
    let callback_url = state.callback_url.clone();
    let (token, authorization_url, scopes) = state
        .call_erp(move |erp| {
            let token = erp.request_token(&callback_url, &scopes)?;
            let url = erp.authorization_url(&token, &scopes);
            Ok::<_, OAuthError>((token, url, scopes))
        })
        .await
        .map_err(FlowError::RequestToken)?;

    tracing::info!(scopes = %join_scopes(&scopes), "Obtained USOS request token");

    Ok(LoginStart {
        pending: PendingHandshake {
            request_token: token.oauth_token,
            request_token_secret: token.oauth_token_secret,
            scopes,
        },
        authorization_url,
    })
}

/// Finish a login from the callback parameters.
///
/// `pending` must already be removed from the session so it is consumed
/// whatever the outcome.
///
/// # Errors
///
/// Returns a [`FlowError`] describing the first failing step.
pub(crate) async fn complete(
    state: &AppState,
    pending: Option<PendingHandshake>,
    oauth_token: Option<String>,
    oauth_verifier: Option<String>,
) -> Result<User, FlowError> {
    let pending = pending.ok_or(FlowError::SessionExpired)?;
    let oauth_token = non_empty(oauth_token).ok_or(FlowError::MalformedCallback("oauth_token"))?;
    let verifier =
        non_empty(oauth_verifier).ok_or(FlowError::MalformedCallback("oauth_verifier"))?;

    if oauth_token != pending.request_token {
        tracing::warn!("Callback token does not match the pending login");
        return Err(FlowError::SessionExpired);
    }

    let request_token = RequestToken {
        oauth_token: pending.request_token,
        oauth_token_secret: pending.request_token_secret,
    };
    let access_token = state
        .call_erp(move |erp| erp.exchange_verifier(&request_token, &verifier))
        .await
        .map_err(FlowError::Exchange)?;

    let identity_token = access_token.clone();
    let identity = state
        .call_erp(move |erp| erp.fetch_identity(&identity_token))
        .await
        .map_err(FlowError::Identity)?;

    let user = NewUser {
        usos_id: identity.id,
        first_name: identity.first_name,
        last_name: identity.last_name,
        email: identity.email.filter(|e| !e.is_empty()),
    };
    let credential = NewCredential {
        access_token: access_token.oauth_token,
        access_token_secret: access_token.oauth_token_secret,
        scopes: join_scopes(&pending.scopes),
    };
    let stored = state.store.persist_login(&user, &credential).await?;

    tracing::info!(usos_id = %stored.usos_id, "User logged in");
    Ok(stored)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
