//! Encrypted session cookie.
//!
//! The whole session is one JSON document stored in a private cookie
//! (encrypted and authenticated). A cookie that fails to decrypt or parse
//! is treated as an empty session.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use tower_cookies::cookie::SameSite;
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies, Key};

/// Lifetime of the session cookie.
const SESSION_MAX_AGE_DAYS: i64 = 30;

/// Longest accepted user id.
const MAX_USER_ID_LEN: usize = 64;

/// A well-formed session identity: printable ASCII, no whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UserId(String);

impl UserId {
    /// Validate a raw id.
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_USER_ID_LEN
            && raw.bytes().all(|b| b.is_ascii_graphic());
        valid.then(|| Self(raw.to_owned()))
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

/// Request token awaiting the user's approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PendingHandshake {
    pub(crate) request_token: String,
    pub(crate) request_token_secret: String,
    pub(crate) scopes: Vec<String>,
}

/// Everything the server keeps in the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) pending: Option<PendingHandshake>,
}

impl SessionData {
    /// The validated identity, if any.
    pub(crate) fn identity(&self) -> Option<UserId> {
        self.user_id.as_deref().and_then(UserId::parse)
    }
}

/// Reads and writes [`SessionData`] through the private cookie jar.
pub(crate) struct SessionCookies {
    key: Key,
    name: String,
    secure: bool,
}

impl SessionCookies {
    /// Derive the cookie key from the configured secret.
    pub(crate) fn new(secret: &str, name: &str, secure: bool) -> Self {
        let digest = Sha512::digest(secret.as_bytes());
        Self {
            key: Key::from(&digest[..]),
            name: name.to_owned(),
            secure,
        }
    }

    /// Load the session, falling back to an empty one.
    pub(crate) fn load(&self, cookies: &Cookies) -> SessionData {
        let Some(cookie) = cookies.private(&self.key).get(&self.name) else {
            return SessionData::default();
        };
        serde_json::from_str(cookie.value()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Discarding unreadable session");
            SessionData::default()
        })
    }

    /// Replace the session.
    pub(crate) fn store(&self, cookies: &Cookies, session: &SessionData) {
        let value = match serde_json::to_string(session) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize session");
                return;
            }
        };
        cookies.private(&self.key).add(self.cookie(value));
    }

    /// Remove the session cookie.
    pub(crate) fn clear(&self, cookies: &Cookies) {
        cookies.private(&self.key).remove(self.cookie(String::new()));
    }

    fn cookie(&self, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.name.clone(), value);
        cookie.set_http_only(true);
        cookie.set_path("/");
        cookie.set_same_site(SameSite::Lax);
        cookie.set_secure(self.secure);
        cookie.set_max_age(Duration::days(SESSION_MAX_AGE_DAYS));
        cookie
    }

    /// Encrypted `name=value` pair for a session, as a browser would send it.
    #[cfg(test)]
    pub(crate) fn encode(&self, session: &SessionData) -> String {
        let mut jar = tower_cookies::cookie::CookieJar::new();
        jar.private_mut(&self.key)
            .add(self.cookie(serde_json::to_string(session).unwrap()));
        let cookie = jar.get(&self.name).unwrap();
        format!("{}={}", cookie.name(), cookie.value())
    }

    /// Decrypt the session from a `Set-Cookie` header value.
    #[cfg(test)]
    pub(crate) fn decode(&self, pair: &str) -> Option<SessionData> {
        let cookie = Cookie::parse_encoded(pair.to_owned()).ok()?;
        let mut jar = tower_cookies::cookie::CookieJar::new();
        jar.add_original(cookie);
        let cookie = jar.private(&self.key).get(&self.name)?;
        serde_json::from_str(cookie.value()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_user_id_accepts_plain_ids() {
        assert_eq!(UserId::parse("123456").unwrap().as_str(), "123456");
        assert!(UserId::parse("abc-DEF_9").is_some());
    }

    #[test]
    fn test_user_id_rejects_malformed() {
        assert!(UserId::parse("").is_none());
        assert!(UserId::parse("12 34").is_none());
        assert!(UserId::parse("12\n").is_none());
        assert!(UserId::parse("ł").is_none());
        assert!(UserId::parse(&"1".repeat(65)).is_none());
        assert!(UserId::parse(&"1".repeat(64)).is_some());
    }

    #[test]
    fn test_session_json_shape() {
        let session = SessionData {
            user_id: Some("42".to_owned()),
            pending: None,
        };
        assert_eq!(
            serde_json::to_string(&session).unwrap(),
            r#"{"user_id":"42"}"#
        );
        let parsed: SessionData = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, SessionData::default());
    }

    #[test]
    fn test_encode_decode() {
        let sessions = SessionCookies::new(&"s".repeat(32), "usos_session", false);
        let session = SessionData {
            user_id: None,
            pending: Some(PendingHandshake {
                request_token: "rt".to_owned(),
                request_token_secret: "rts".to_owned(),
                scopes: vec!["studies".to_owned()],
            }),
        };

        let pair = sessions.encode(&session);
        assert!(pair.starts_with("usos_session="));
        assert!(!pair.contains("rts"));
        assert_eq!(sessions.decode(&pair), Some(session));
    }

    #[test]
    fn test_decode_with_other_key_fails() {
        let sessions = SessionCookies::new(&"a".repeat(32), "usos_session", false);
        let other = SessionCookies::new(&"b".repeat(32), "usos_session", false);

        let pair = sessions.encode(&SessionData {
            user_id: Some("1".to_owned()),
            pending: None,
        });
        assert_eq!(other.decode(&pair), None);
    }
}
