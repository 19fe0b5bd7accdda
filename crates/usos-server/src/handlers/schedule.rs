//! Timetable endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use usos_oauth::quirks::SCHEDULE_FIELDS;

use crate::calendar::{Activity, Calendar};
use crate::error::ServerError;
use crate::proxy::{self, ProxiedResponse};
use crate::session::UserId;
use crate::state::AppState;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Query parameters for GET /api/schedule.
#[derive(Debug, Deserialize)]
pub(crate) struct ScheduleQuery {
    start: Option<String>,
    days: Option<String>,
}

/// Handle GET /api/schedule.
///
/// `start` defaults to today and `days` to the window ceiling.
pub(crate) async fn schedule(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    Query(query): Query<ScheduleQuery>,
) -> Result<ProxiedResponse, ServerError> {
    let params = timetable_params(&state, &query)?;
    proxy::execute(&state, &user_id, "tt/user", params, None).await
}

/// Handle GET /api/calendar.
///
/// Same window as `/api/schedule`, answered as typed events. USOS error
/// statuses are relayed unchanged.
pub(crate) async fn calendar(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Response, ServerError> {
    let params = timetable_params(&state, &query)?;
    let response = proxy::execute(&state, &user_id, "tt/user", params, None).await?;
    if !(200..300).contains(&response.status) {
        return Ok(response.into_response());
    }

    let activities: Vec<Activity> = serde_json::from_slice(&response.body).map_err(|e| {
        tracing::warn!(usos_id = %user_id.as_str(), error = %e, "Unexpected timetable response");
        ServerError::BadGateway("unexpected timetable response".to_owned())
    })?;
    Ok(Json(Calendar::from_activities(activities)).into_response())
}

fn timetable_params(
    state: &AppState,
    query: &ScheduleQuery,
) -> Result<Vec<(String, String)>, ServerError> {
    let start = match query.start.as_deref() {
        Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|_| ServerError::BadRequest(format!("invalid start date: {raw}")))?,
        None => Local::now().date_naive(),
    };
    let days = query
        .days
        .as_deref()
        .map_or(state.window.max_days(), |raw| state.window.clamp_days(raw));

    Ok(vec![
        ("start".to_owned(), start.format(DATE_FORMAT).to_string()),
        ("days".to_owned(), days.to_string()),
        ("fields".to_owned(), SCHEDULE_FIELDS.to_owned()),
    ])
}
