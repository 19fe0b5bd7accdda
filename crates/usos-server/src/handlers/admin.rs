//! Admin-only endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use usos_store::User;

use crate::error::ServerError;
use crate::state::AppState;

/// Handle GET /api/admin/users/{usos_id}.
pub(crate) async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(usos_id): Path<String>,
) -> Result<Json<User>, ServerError> {
    state
        .store
        .find_user(&usos_id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("user {usos_id}")))
}
