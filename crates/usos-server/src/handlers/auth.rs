//! Login, callback and logout endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_cookies::Cookies;
use usos_oauth::quirks::parse_scopes;

use crate::error::ServerError;
use crate::flow::{self, FlowError};
use crate::handlers::{found, wants_json};
use crate::state::AppState;

/// Query parameters for GET /auth/login.
#[derive(Debug, Deserialize)]
pub(crate) struct LoginQuery {
    /// `|`- or `,`-separated scope list overriding the defaults.
    scopes: Option<String>,
}

/// Query parameters USOS appends to the callback URL.
#[derive(Debug, Deserialize)]
pub(crate) struct CallbackQuery {
    oauth_token: Option<String>,
    oauth_verifier: Option<String>,
}

/// Handle GET /auth/login.
///
/// Starting a new login replaces any pending one in the session.
pub(crate) async fn login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    headers: HeaderMap,
    Query(query): Query<LoginQuery>,
) -> Response {
    let scopes = query
        .scopes
        .as_deref()
        .map(parse_scopes)
        .filter(|scopes| !scopes.is_empty())
        .unwrap_or_else(|| state.default_scopes.clone());

    let start = match flow::begin(&state, scopes).await {
        Ok(start) => start,
        Err(e) => {
            tracing::error!(error = %e, tag = e.tag(), "Failed to obtain USOS request token");
            return flow_failure(&state, &headers, &e);
        }
    };

    let mut session = state.sessions.load(&cookies);
    session.pending = Some(start.pending);
    state.sessions.store(&cookies, &session);

    if wants_json(&headers) {
        return Json(json!({"authorization_url": start.authorization_url})).into_response();
    }
    found(&start.authorization_url)
}

/// Handle GET /auth/callback.
pub(crate) async fn callback(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let mut session = state.sessions.load(&cookies);
    let pending = session.pending.take();
    state.sessions.store(&cookies, &session);

    match flow::complete(&state, pending, query.oauth_token, query.oauth_verifier).await {
        Ok(user) => {
            session.user_id = Some(user.usos_id);
            state.sessions.store(&cookies, &session);
            found(&state.frontend_url)
        }
        Err(e) => {
            tracing::warn!(error = %e, tag = e.tag(), "Login callback failed");
            flow_failure(&state, &headers, &e)
        }
    }
}

/// Report a login failure by tag only: JSON for API clients, otherwise a
/// redirect to the frontend.
fn flow_failure(state: &AppState, headers: &HeaderMap, e: &FlowError) -> Response {
    if wants_json(headers) {
        let body = json!({"error": e.tag(), "details": e.message()});
        return (e.status(), Json(body)).into_response();
    }
    found(&state.frontend_error_url(e.tag()))
}

/// Handle POST /auth/logout.
///
/// Works without a session too; the cookie is cleared either way.
pub(crate) async fn logout(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Result<Json<Value>, ServerError> {
    let identity = state.sessions.load(&cookies).identity();
    state.sessions.clear(&cookies);

    if let Some(user_id) = identity {
        let deleted = state.store.delete_credential(user_id.as_str()).await?;
        tracing::info!(usos_id = %user_id.as_str(), deleted, "User logged out");
    }
    Ok(Json(json!({"message": "Logged out"})))
}
