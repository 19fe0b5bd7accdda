//! Signed resource calls on behalf of a user.

use super::ErpClient;
use crate::error::TransportError;
use crate::oauth::AccessToken;
use crate::quirks::{FieldProfiles, is_field_rejection};
use crate::transport::ErpResponse;

impl ErpClient {
    /// Signed GET of `services/{path}` with the user's access token.
    ///
    /// Responses are returned for any status; only transport failures are
    /// errors.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if no response could be obtained.
    pub fn signed_get(
        &self,
        access_token: &AccessToken,
        path: &str,
        params: Vec<(String, String)>,
    ) -> Result<ErpResponse, TransportError> {
        let oauth = self.oauth_params().with_token(&access_token.oauth_token);
        self.send_signed(
            self.resource_url(path),
            params,
            &oauth,
            &access_token.oauth_token_secret,
        )
    }

    /// Signed GET trying each `fields` selector until one is accepted.
    ///
    /// Moves to the next profile only when USOS rejects the selector; any
    /// other response, success or not, is returned as is. When every
    /// profile is rejected the last rejection is returned.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if no response could be obtained.
    pub fn get_with_profiles(
        &self,
        access_token: &AccessToken,
        path: &str,
        params: &[(String, String)],
        profiles: &FieldProfiles,
    ) -> Result<ErpResponse, TransportError> {
        let mut last_rejection = None;

        for fields in profiles.iter() {
            let mut request_params: Vec<(String, String)> = params
                .iter()
                .filter(|(k, _)| k != "fields")
                .cloned()
                .collect();
            request_params.push(("fields".to_owned(), fields.to_owned()));

            let response = self.signed_get(access_token, path, request_params)?;
            if !is_field_rejection(response.status, &response.body_text()) {
                return Ok(response);
            }

            tracing::info!(path, fields, "USOS rejected fields selector, trying next profile");
            last_rejection = Some(response);
        }

        last_rejection.map_or_else(|| self.signed_get(access_token, path, params.to_vec()), Ok)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::tests::{client_with, verify_signature};
    use crate::transport::MockTransport;
    use pretty_assertions::assert_eq;

    fn token() -> AccessToken {
        AccessToken {
            oauth_token: "at".to_owned(),
            oauth_token_secret: "ats".to_owned(),
        }
    }

    const REJECTED: &str = r#"{"message":"Unrecognized character at position 10"}"#;

    #[test]
    fn test_signed_get_forwards_params() {
        let transport = Arc::new(MockTransport::new().with_json(200, "[]"));
        let client = client_with(&transport);

        let response = client
            .signed_get(
                &token(),
                "tt/user",
                vec![("days".to_owned(), "7".to_owned())],
            )
            .unwrap();
        assert_eq!(response.status, 200);

        let request = &transport.requests()[0];
        assert_eq!(request.url, "https://usos.test/services/tt/user");
        assert_eq!(request.param("days"), Some("7"));
        assert!(request.authorization.contains("oauth_token=\"at\""));
        assert!(verify_signature(request, "ats", true));
    }

    #[test]
    fn test_signed_get_returns_error_status() {
        let transport = Arc::new(MockTransport::new().with_json(418, r#"{"x":1}"#));
        let client = client_with(&transport);

        let response = client.signed_get(&token(), "x", Vec::new()).unwrap();
        assert_eq!(response.status, 418);
        assert_eq!(response.body, br#"{"x":1}"#);
    }

    #[test]
    fn test_profiles_first_accepted() {
        let transport = Arc::new(MockTransport::new().with_json(200, "[]"));
        let client = client_with(&transport);
        let profiles = FieldProfiles::new(["a|b", "a"]);

        client
            .get_with_profiles(&token(), "groups/user", &[], &profiles)
            .unwrap();

        assert_eq!(transport.request_count(), 1);
        assert_eq!(transport.requests()[0].param("fields"), Some("a|b"));
    }

    #[test]
    fn test_profiles_fall_back_on_rejection() {
        let transport = Arc::new(
            MockTransport::new()
                .with_json(400, REJECTED)
                .with_json(200, "[]"),
        );
        let client = client_with(&transport);
        let profiles = FieldProfiles::new(["a[b]", "a"]);

        let response = client
            .get_with_profiles(
                &token(),
                "groups/user",
                &[("fields".to_owned(), "ignored".to_owned())],
                &profiles,
            )
            .unwrap();

        assert_eq!(response.status, 200);
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].param("fields"), Some("a[b]"));
        assert_eq!(requests[1].param("fields"), Some("a"));
        assert_eq!(
            requests[1].query.iter().filter(|(k, _)| k == "fields").count(),
            1
        );
    }

    #[test]
    fn test_profiles_stop_on_other_errors() {
        let transport = Arc::new(
            MockTransport::new()
                .with_json(401, r#"{"error":"invalid_token"}"#)
                .with_json(200, "[]"),
        );
        let client = client_with(&transport);
        let profiles = FieldProfiles::new(["a", "b"]);

        let response = client
            .get_with_profiles(&token(), "groups/user", &[], &profiles)
            .unwrap();
        assert_eq!(response.status, 401);
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn test_profiles_all_rejected_returns_last() {
        let transport = Arc::new(
            MockTransport::new()
                .with_json(400, REJECTED)
                .with_json(400, r#"{"error":"invalid_fields"}"#),
        );
        let client = client_with(&transport);
        let profiles = FieldProfiles::new(["a", "b"]);

        let response = client
            .get_with_profiles(&token(), "groups/user", &[], &profiles)
            .unwrap();
        assert_eq!(response.status, 400);
        assert_eq!(response.body_text(), r#"{"error":"invalid_fields"}"#);
        assert_eq!(transport.request_count(), 2);
    }
}
