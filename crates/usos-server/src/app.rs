//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::{gate, security};
use crate::state::AppState;

/// Create the application router.
///
/// # Arguments
///
/// * `state` - Shared application state
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/auth/login", get(handlers::auth::login))
        .route("/auth/callback", get(handlers::auth::callback))
        .route("/auth/logout", post(handlers::auth::logout));

    let admin_routes = Router::new()
        .route("/api/admin/users/{usos_id}", get(handlers::admin::get_user))
        .route_layer(from_fn_with_state(Arc::clone(&state), gate::require_admin));

    // Gate runs before any handler or admin check
    let protected_routes = Router::new()
        .route("/api/services/{*path}", get(handlers::services::get_service))
        .route("/api/users/me", get(handlers::users::me))
        .route("/api/schedule", get(handlers::schedule::schedule))
        .route("/api/calendar", get(handlers::schedule::calendar))
        .route("/api/groups", get(handlers::studies::groups))
        .route("/api/courses", get(handlers::studies::courses))
        .merge(admin_routes)
        .route_layer(from_fn_with_state(Arc::clone(&state), gate::require_session));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(security::content_type_options_layer())
                .layer(security::frame_options_layer())
                .layer(security::cache_control_layer())
                .layer(CookieManagerLayer::new()),
        )
        .with_state(state)
}
