//! Three-legged OAuth handshake and identity lookup.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use serde::Deserialize;

use super::ErpClient;
use crate::error::OAuthError;
use crate::oauth::{AccessToken, RequestToken, oauth_encode};
use crate::quirks::join_scopes;
use crate::transport::ErpResponse;

/// Fixed, flat field list for the identity lookup.
const IDENTITY_FIELDS: &str = "id|first_name|last_name|email";

/// The authenticated user as reported by `users/user`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable USOS user id, never blank.
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

/// `users/user` document; any field may be absent or null.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IdentityDocument {
    id: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
}

impl IdentityDocument {
    fn into_identity(self) -> Result<Identity, OAuthError> {
        let id = self
            .id
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty())
            .ok_or(OAuthError::IdentityMissing)?;
        Ok(Identity {
            id,
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            email: self.email.filter(|e| !e.trim().is_empty()),
        })
    }
}

impl ErpClient {
    /// Step 1: Request temporary credentials.
    ///
    /// # Arguments
    /// * `callback_url` - Exact callback URL registered with USOS
    /// * `scopes` - Scopes the user is asked to grant
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, USOS rejects it, or the
    /// response lacks the token fields.
    pub fn request_token(
        &self,
        callback_url: &str,
        scopes: &[String],
    ) -> Result<RequestToken, OAuthError> {
        let oauth = self.oauth_params().with_callback(callback_url);
        let params = vec![("scopes".to_owned(), join_scopes(scopes))];

        let response = self.send_signed(
            format!("{}/oauth/request_token", self.services_url()),
            params,
            &oauth,
            "",
        )?;
        let params = parse_token_response(&response, "Request token")?;

        Ok(RequestToken {
            oauth_token: get_required_param(&params, "oauth_token")?,
            oauth_token_secret: get_required_param(&params, "oauth_token_secret")?,
        })
    }

    /// Step 2: Get authorization URL for a request token.
    #[must_use]
    pub fn authorization_url(&self, request_token: &RequestToken, scopes: &[String]) -> String {
        format!(
            "{}/oauth/authorize?oauth_token={}&scopes={}",
            self.services_url(),
            oauth_encode(&request_token.oauth_token),
            oauth_encode(&join_scopes(scopes))
        )
    }

    /// Step 3: Exchange verifier for access token.
    ///
    /// The request is keyed by the request token secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, USOS rejects the verifier, or
    /// the response lacks the token fields.
    pub fn exchange_verifier(
        &self,
        request_token: &RequestToken,
        verifier: &str,
    ) -> Result<AccessToken, OAuthError> {
        let oauth = self
            .oauth_params()
            .with_token(&request_token.oauth_token)
            .with_verifier(verifier);

        let response = self.send_signed(
            format!("{}/oauth/access_token", self.services_url()),
            Vec::new(),
            &oauth,
            &request_token.oauth_token_secret,
        )?;
        let params = parse_token_response(&response, "Access token exchange")?;

        Ok(AccessToken {
            oauth_token: get_required_param(&params, "oauth_token")?,
            oauth_token_secret: get_required_param(&params, "oauth_token_secret")?,
        })
    }

    /// Look up the user owning the access token.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::IdentityMissing`] if the response has no id,
    /// other variants if the call fails or the body is not JSON.
    pub fn fetch_identity(&self, access_token: &AccessToken) -> Result<Identity, OAuthError> {
        let response = self.signed_get(
            access_token,
            "users/user",
            vec![("fields".to_owned(), IDENTITY_FIELDS.to_owned())],
        )?;

        if !response.is_success() {
            return Err(OAuthError::RemoteRejected {
                status: response.status,
                body: response.body_text(),
            });
        }

        let document: IdentityDocument = serde_json::from_slice(&response.body)
            .map_err(|e| OAuthError::MalformedResponse(format!("identity: {e}")))?;
        document.into_identity()
    }
}

/// Check status and decode a form-encoded token response.
fn parse_token_response(
    response: &ErpResponse,
    step: &str,
) -> Result<HashMap<String, String>, OAuthError> {
    let body = response.body_text();
    if !response.is_success() {
        tracing::warn!(status = response.status, "{step} rejected by USOS");
        return Err(OAuthError::RemoteRejected {
            status: response.status,
            body,
        });
    }
    Ok(parse_oauth_response(&body))
}

/// Parse OAuth URL-encoded response body.
fn parse_oauth_response(body: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in body.trim().split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            params.insert(
                percent_decode_str(key).decode_utf8_lossy().into_owned(),
                percent_decode_str(value).decode_utf8_lossy().into_owned(),
            );
        }
    }
    params
}

/// Extract required non-empty parameter from OAuth response.
fn get_required_param(params: &HashMap<String, String>, key: &str) -> Result<String, OAuthError> {
    params
        .get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| OAuthError::MalformedResponse(format!("Missing parameter: {key}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::tests::{client_with, verify_signature};
    use crate::error::TransportError;
    use crate::transport::MockTransport;
    use pretty_assertions::assert_eq;

    fn scopes() -> Vec<String> {
        vec!["studies".to_owned(), "email".to_owned()]
    }

    fn access_token() -> AccessToken {
        AccessToken {
            oauth_token: "at".to_owned(),
            oauth_token_secret: "ats".to_owned(),
        }
    }

    #[test]
    fn test_parse_oauth_response() {
        let body = "oauth_token=abc123&oauth_token_secret=xyz789&oauth_callback_confirmed=true";
        let params = parse_oauth_response(body);

        assert_eq!(params.get("oauth_token"), Some(&"abc123".to_owned()));
        assert_eq!(
            params.get("oauth_token_secret"),
            Some(&"xyz789".to_owned())
        );
        assert_eq!(
            params.get("oauth_callback_confirmed"),
            Some(&"true".to_owned())
        );
    }

    #[test]
    fn test_parse_oauth_response_with_encoded_values() {
        let body = "oauth_token=abc%2B123&oauth_token_secret=xyz%3D789\n";
        let params = parse_oauth_response(body);

        assert_eq!(params.get("oauth_token"), Some(&"abc+123".to_owned()));
        assert_eq!(
            params.get("oauth_token_secret"),
            Some(&"xyz=789".to_owned())
        );
    }

    #[test]
    fn test_get_required_param_missing() {
        let params = HashMap::new();
        let err = get_required_param(&params, "oauth_token").unwrap_err();
        assert!(matches!(err, OAuthError::MalformedResponse(_)));
        assert!(err.to_string().contains("Missing parameter"));
    }

    #[test]
    fn test_request_token_success() {
        let transport = Arc::new(
            MockTransport::new().with_form(200, "oauth_token=rt&oauth_token_secret=rts"),
        );
        let client = client_with(&transport);

        let token = client
            .request_token("http://localhost:8080/auth/callback", &scopes())
            .unwrap();
        assert_eq!(
            token,
            RequestToken {
                oauth_token: "rt".to_owned(),
                oauth_token_secret: "rts".to_owned(),
            }
        );

        let request = &transport.requests()[0];
        assert_eq!(
            request.url,
            "https://usos.test/services/oauth/request_token"
        );
        assert_eq!(request.param("scopes"), Some("studies|email"));
        assert!(request.authorization.contains("oauth_callback="));
        assert!(!request.authorization.contains("oauth_token="));
        assert!(verify_signature(request, "", true));
    }

    #[test]
    fn test_request_token_missing_secret() {
        let transport = Arc::new(MockTransport::new().with_form(200, "oauth_token=rt"));
        let client = client_with(&transport);

        let err = client.request_token("http://cb", &scopes()).unwrap_err();
        assert!(matches!(err, OAuthError::MalformedResponse(_)));
    }

    #[test]
    fn test_request_token_rejected() {
        let transport = Arc::new(MockTransport::new().with_response(
            401,
            Some("text/plain"),
            "oauth_problem=signature_invalid",
        ));
        let client = client_with(&transport);

        let err = client.request_token("http://cb", &scopes()).unwrap_err();
        assert!(matches!(err, OAuthError::RemoteRejected { status: 401, .. }));
    }

    #[test]
    fn test_request_token_timeout() {
        let transport = Arc::new(MockTransport::new().with_error(TransportError::Timeout));
        let client = client_with(&transport);

        let err = client.request_token("http://cb", &scopes()).unwrap_err();
        assert!(matches!(err, OAuthError::Transport(TransportError::Timeout)));
    }

    #[test]
    fn test_authorization_url() {
        let transport = Arc::new(MockTransport::new());
        let client = client_with(&transport);
        let token = RequestToken {
            oauth_token: "test token".to_owned(),
            oauth_token_secret: "secret".to_owned(),
        };

        assert_eq!(
            client.authorization_url(&token, &scopes()),
            "https://usos.test/services/oauth/authorize?oauth_token=test%20token&scopes=studies%7Cemail"
        );
    }

    #[test]
    fn test_exchange_verifier_signed_with_request_secret() {
        let transport = Arc::new(
            MockTransport::new().with_form(200, "oauth_token=at&oauth_token_secret=ats"),
        );
        let client = client_with(&transport);
        let request_token = RequestToken {
            oauth_token: "rt".to_owned(),
            oauth_token_secret: "rts".to_owned(),
        };

        let token = client.exchange_verifier(&request_token, "v123").unwrap();
        assert_eq!(token, access_token());

        let request = &transport.requests()[0];
        assert_eq!(request.url, "https://usos.test/services/oauth/access_token");
        assert!(request.authorization.contains("oauth_token=\"rt\""));
        assert!(request.authorization.contains("oauth_verifier=\"v123\""));
        assert!(verify_signature(request, "rts", true));
        assert!(!verify_signature(request, "", true));
    }

    #[test]
    fn test_fetch_identity() {
        let transport = Arc::new(MockTransport::new().with_json(
            200,
            r#"{"id":"12345","first_name":"Jan","last_name":"Kowalski","email":null}"#,
        ));
        let client = client_with(&transport);

        let identity = client.fetch_identity(&access_token()).unwrap();
        assert_eq!(
            identity,
            Identity {
                id: "12345".to_owned(),
                first_name: "Jan".to_owned(),
                last_name: "Kowalski".to_owned(),
                email: None,
            }
        );

        let request = &transport.requests()[0];
        assert_eq!(request.url, "https://usos.test/services/users/user");
        assert_eq!(request.param("fields"), Some(IDENTITY_FIELDS));
        assert!(verify_signature(request, "ats", true));
    }

    #[test]
    fn test_fetch_identity_without_id() {
        let transport = Arc::new(MockTransport::new().with_json(200, r#"{"first_name":"Jan"}"#));
        let client = client_with(&transport);

        let err = client.fetch_identity(&access_token()).unwrap_err();
        assert!(matches!(err, OAuthError::IdentityMissing));
    }

    #[test]
    fn test_fetch_identity_null_or_blank_id() {
        for body in [
            r#"{"id":null,"first_name":"Jan"}"#,
            r#"{"id":"  ","first_name":"Jan"}"#,
        ] {
            let transport = Arc::new(MockTransport::new().with_json(200, body));
            let client = client_with(&transport);

            let err = client.fetch_identity(&access_token()).unwrap_err();
            assert!(matches!(err, OAuthError::IdentityMissing), "{body}");
        }
    }

    #[test]
    fn test_fetch_identity_null_names() {
        let transport = Arc::new(MockTransport::new().with_json(
            200,
            r#"{"id":"12345","first_name":null,"last_name":null,"email":""}"#,
        ));
        let client = client_with(&transport);

        let identity = client.fetch_identity(&access_token()).unwrap();
        assert_eq!(
            identity,
            Identity {
                id: "12345".to_owned(),
                first_name: String::new(),
                last_name: String::new(),
                email: None,
            }
        );
    }

    #[test]
    fn test_fetch_identity_not_json() {
        let transport = Arc::new(MockTransport::new().with_response(200, None, "<html>"));
        let client = client_with(&transport);

        let err = client.fetch_identity(&access_token()).unwrap_err();
        assert!(matches!(err, OAuthError::MalformedResponse(_)));
    }
}
