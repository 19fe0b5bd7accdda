//! Generic USOS proxy endpoint.

use std::sync::Arc;

use axum::Extension;
use axum::extract::{Path, Query, State};

use crate::error::ServerError;
use crate::proxy::{self, ProxiedResponse};
use crate::session::UserId;
use crate::state::AppState;

/// Handle GET /api/services/{*path}.
///
/// Query parameters are forwarded in order, duplicates included.
pub(crate) async fn get_service(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    Path(path): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<ProxiedResponse, ServerError> {
    proxy::execute(&state, &user_id, &path, params, None).await
}
