//! Signed request executor.
//!
//! Relays a GET to `{USOS}/services/{path}` with the user's stored access
//! credentials and hands the upstream response back unchanged.

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use usos_oauth::quirks::FieldProfiles;
use usos_oauth::{AccessToken, DEFAULT_CONTENT_TYPE, ErpResponse};

use crate::error::ServerError;
use crate::session::UserId;
use crate::state::AppState;

/// Upstream response relayed to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProxiedResponse {
    pub(crate) status: u16,
    pub(crate) content_type: String,
    pub(crate) body: Vec<u8>,
}

impl From<ErpResponse> for ProxiedResponse {
    fn from(response: ErpResponse) -> Self {
        let content_type = response.content_type.unwrap_or_else(|| {
            tracing::warn!(
                status = response.status,
                "USOS response has no content type, assuming JSON"
            );
            DEFAULT_CONTENT_TYPE.to_owned()
        });
        Self {
            status: response.status,
            content_type,
            body: response.body,
        }
    }
}

impl IntoResponse for ProxiedResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::BAD_GATEWAY);
        (
            status,
            [(header::CONTENT_TYPE, self.content_type)],
            Body::from(self.body),
        )
            .into_response()
    }
}

/// Normalize a resource path to be relative to `services/`.
///
/// Strips leading slashes and a leading `services/` segment. Empty paths
/// and dot segments are rejected.
pub(crate) fn normalize_path(raw: &str) -> Result<String, ServerError> {
    let path = raw.trim_start_matches('/');
    let path = path.strip_prefix("services/").unwrap_or(path);
    let path = path.trim_matches('/');

    if path.is_empty() || path == "services" {
        return Err(ServerError::BadRequest("missing USOS resource path".to_owned()));
    }
    if path.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(ServerError::BadRequest(format!(
            "invalid USOS resource path: {path}"
        )));
    }
    Ok(path.to_owned())
}

/// Perform a signed GET for the user.
///
/// When `profiles` is given, the `fields` selector is chosen by the
/// fallback ladder instead of the caller.
///
/// # Errors
///
/// - [`ServerError::Unauthenticated`] if the user has no stored credential
/// - [`ServerError::BadRequest`] for an invalid path
/// - [`ServerError::UpstreamUnreachable`] / [`ServerError::UpstreamTimeout`]
///   if USOS gives no response
pub(crate) async fn execute(
    state: &AppState,
    user_id: &UserId,
    resource_path: &str,
    mut params: Vec<(String, String)>,
    profiles: Option<FieldProfiles>,
) -> Result<ProxiedResponse, ServerError> {
    let path = normalize_path(resource_path)?;

    let Some(credential) = state.store.find_credential(user_id.as_str()).await? else {
        tracing::warn!(usos_id = %user_id.as_str(), "No stored USOS credential");
        return Err(ServerError::Unauthenticated);
    };

    if state.proxy_append_scopes
        && !credential.scopes.is_empty()
        && !params.iter().any(|(k, _)| k == "scopes")
    {
        params.push(("scopes".to_owned(), credential.scopes.clone()));
    }
    if state.window.apply(&path, &mut params) {
        tracing::debug!(path = %path, "Clamped days to the USOS window");
    }

    let token = AccessToken {
        oauth_token: credential.access_token,
        oauth_token_secret: credential.access_token_secret,
    };
    let target = path.clone();
    let result = state
        .call_erp(move |erp| match profiles {
            Some(profiles) => erp.get_with_profiles(&token, &target, &params, &profiles),
            None => erp.signed_get(&token, &target, params),
        })
        .await;

    match result {
        Ok(response) => {
            if !response.is_success() {
                tracing::warn!(
                    usos_id = %user_id.as_str(),
                    path = %path,
                    status = response.status,
                    "USOS returned an error status"
                );
            }
            Ok(response.into())
        }
        Err(e) => {
            tracing::error!(usos_id = %user_id.as_str(), path = %path, error = %e, "USOS call failed");
            Err(e.into())
        }
    }
}
