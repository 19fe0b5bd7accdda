//! Group and course endpoints.
//!
//! Both resources reject some `fields` selectors depending on the USOS
//! installation, so the selector comes from a fallback ladder and any
//! caller-supplied `fields` is ignored.

use std::sync::Arc;

use axum::Extension;
use axum::extract::{Query, State};
use usos_oauth::quirks::FieldProfiles;

use crate::error::ServerError;
use crate::proxy::{self, ProxiedResponse};
use crate::session::UserId;
use crate::state::AppState;

/// Handle GET /api/groups.
pub(crate) async fn groups(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<ProxiedResponse, ServerError> {
    proxy::execute(
        &state,
        &user_id,
        "groups/user",
        without_fields(params),
        Some(FieldProfiles::groups()),
    )
    .await
}

/// Handle GET /api/courses.
pub(crate) async fn courses(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<ProxiedResponse, ServerError> {
    proxy::execute(
        &state,
        &user_id,
        "courses/user",
        without_fields(params),
        Some(FieldProfiles::courses()),
    )
    .await
}

fn without_fields(params: Vec<(String, String)>) -> Vec<(String, String)> {
    params.into_iter().filter(|(k, _)| k != "fields").collect()
}
