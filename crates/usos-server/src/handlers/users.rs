//! Current user endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::{Extension, Json};
use usos_store::User;

use crate::error::ServerError;
use crate::session::UserId;
use crate::state::AppState;

/// Handle GET /api/users/me.
pub(crate) async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<User>, ServerError> {
    state
        .store
        .find_user(user_id.as_str())
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("user {}", user_id.as_str())))
}
