//! Session and role gates.
//!
//! [`require_session`] admits requests whose session carries a well-formed
//! user id and hands it to handlers as a [`UserId`] extension.
//! [`require_admin`] runs after it and checks the stored role.

use std::sync::Arc;

use axum::Extension;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tower_cookies::Cookies;
use usos_store::Role;

use crate::error::ServerError;
use crate::session::UserId;
use crate::state::AppState;

/// Reject requests without a session identity.
pub(crate) async fn require_session(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(user_id) = state.sessions.load(&cookies).identity() else {
        tracing::debug!(path = %request.uri().path(), "Rejected request without session");
        return ServerError::Unauthenticated.into_response();
    };
    request.extensions_mut().insert(user_id);
    next.run(request).await
}

/// Reject users whose stored role is not admin.
pub(crate) async fn require_admin(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    request: Request,
    next: Next,
) -> Response {
    match state.store.find_user(user_id.as_str()).await {
        Ok(Some(user)) if user.role == Role::Admin => next.run(request).await,
        Ok(Some(_)) => {
            tracing::warn!(usos_id = %user_id.as_str(), "Admin route denied");
            ServerError::Forbidden.into_response()
        }
        Ok(None) => ServerError::Unauthenticated.into_response(),
        Err(e) => ServerError::from(e).into_response(),
    }
}
