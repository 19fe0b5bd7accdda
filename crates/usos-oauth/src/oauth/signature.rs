//! OAuth 1.0 HMAC-SHA1 signature generation (RFC 5849).

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_encode};
use rand::RngExt;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// OAuth unreserved characters: A-Z a-z 0-9 - . _ ~
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Signature method advertised in `oauth_signature_method`.
pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";

/// Percent-encode string per RFC 3986 (uppercase hex, space as `%20`).
#[must_use]
pub fn oauth_encode(input: &str) -> String {
    percent_encode(input.as_bytes(), OAUTH_ENCODE_SET).to_string()
}

/// Generate cryptographically random nonce (32 hex characters).
fn generate_nonce() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

/// Generate Unix timestamp.
fn generate_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}

/// Protocol parameters of one signed request.
///
/// Nonce and timestamp are generated by [`OAuthParams::new`] and can be
/// pinned with [`OAuthParams::with_nonce_and_timestamp`] to reproduce a
/// signature.
#[derive(Debug, Clone)]
pub struct OAuthParams {
    consumer_key: String,
    nonce: String,
    timestamp: String,
    token: Option<String>,
    callback: Option<String>,
    verifier: Option<String>,
}

impl OAuthParams {
    /// Fresh parameters for the given consumer key.
    #[must_use]
    pub fn new(consumer_key: &str) -> Self {
        Self {
            consumer_key: consumer_key.to_owned(),
            nonce: generate_nonce(),
            timestamp: generate_timestamp(),
            token: None,
            callback: None,
            verifier: None,
        }
    }

    /// Pin nonce and timestamp.
    #[must_use]
    pub fn with_nonce_and_timestamp(mut self, nonce: &str, timestamp: &str) -> Self {
        nonce.clone_into(&mut self.nonce);
        timestamp.clone_into(&mut self.timestamp);
        self
    }

    /// Set `oauth_token` (request token or access token).
    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_owned());
        self
    }

    /// Set `oauth_callback` (request token phase).
    #[must_use]
    pub fn with_callback(mut self, callback: &str) -> Self {
        self.callback = Some(callback.to_owned());
        self
    }

    /// Set `oauth_verifier` (access token phase).
    #[must_use]
    pub fn with_verifier(mut self, verifier: &str) -> Self {
        self.verifier = Some(verifier.to_owned());
        self
    }

    /// The nonce used for this request.
    #[must_use]
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// All `oauth_*` pairs, without `oauth_signature`.
    fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("oauth_consumer_key".to_owned(), self.consumer_key.clone()),
            ("oauth_nonce".to_owned(), self.nonce.clone()),
            (
                "oauth_signature_method".to_owned(),
                SIGNATURE_METHOD.to_owned(),
            ),
            ("oauth_timestamp".to_owned(), self.timestamp.clone()),
            ("oauth_version".to_owned(), "1.0".to_owned()),
        ];
        if let Some(token) = &self.token {
            pairs.push(("oauth_token".to_owned(), token.clone()));
        }
        if let Some(callback) = &self.callback {
            pairs.push(("oauth_callback".to_owned(), callback.clone()));
        }
        if let Some(verifier) = &self.verifier {
            pairs.push(("oauth_verifier".to_owned(), verifier.clone()));
        }
        pairs
    }
}

/// Build OAuth signature base string per RFC 5849 Section 3.4.1.
///
/// Format: `HTTP_METHOD&encoded_base_url&encoded_parameters`
///
/// Parameters are encoded first and then sorted by key and value.
/// Repeated keys are all kept.
#[must_use]
pub fn build_signature_base_string(
    method: &str,
    base_url: &str,
    params: &[(String, String)],
) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (oauth_encode(k), oauth_encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        oauth_encode(base_url),
        oauth_encode(&param_string)
    )
}

/// Sign data with HMAC-SHA1 and return base64-encoded signature.
fn sign_hmac_sha1(key: &str, data: &str) -> String {
    let Ok(mut mac) = HmacSha1::new_from_slice(key.as_bytes()) else {
        unreachable!("HMAC accepts keys of any length");
    };
    mac.update(data.as_bytes());
    BASE64_STANDARD.encode(mac.finalize().into_bytes())
}

/// Compute the `oauth_signature` value.
///
/// `params` is the union of protocol and request parameters.
/// `token_secret` is empty during the request token phase.
#[must_use]
pub fn sign(
    method: &str,
    base_url: &str,
    params: &[(String, String)],
    consumer_secret: &str,
    token_secret: &str,
) -> String {
    let base_string = build_signature_base_string(method, base_url, params);
    let key = format!(
        "{}&{}",
        oauth_encode(consumer_secret),
        oauth_encode(token_secret)
    );
    sign_hmac_sha1(&key, &base_string)
}

/// Build OAuth Authorization header from `oauth_*` pairs in sorted key order.
fn build_authorization_header(mut oauth_params: Vec<(String, String)>) -> String {
    oauth_params.sort();
    let header_parts: Vec<String> = oauth_params
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, oauth_encode(v)))
        .collect();
    format!("OAuth {}", header_parts.join(", "))
}

/// Create OAuth Authorization header value.
///
/// # Arguments
/// * `method` - HTTP method (GET, POST, etc.)
/// * `base_url` - URL without query string (<scheme://host/path>)
/// * `signed_params` - Request parameters included in the signature
/// * `oauth` - Protocol parameters
/// * `consumer_secret` - OAuth consumer secret
/// * `token_secret` - Request or access token secret (empty if none)
#[must_use]
pub fn create_authorization_header(
    method: &str,
    base_url: &str,
    signed_params: &[(String, String)],
    oauth: &OAuthParams,
    consumer_secret: &str,
    token_secret: &str,
) -> String {
    let mut oauth_params = oauth.to_pairs();

    // Signature params: OAuth params + request params (RFC 5849 Section 3.4.1.3)
    let mut signature_params = oauth_params.clone();
    signature_params.extend(signed_params.iter().cloned());

    let signature = sign(
        method,
        base_url,
        &signature_params,
        consumer_secret,
        token_secret,
    );
    oauth_params.push(("oauth_signature".to_owned(), signature));

    build_authorization_header(oauth_params)
}

/// Parse an `Authorization: OAuth ...` header back into decoded pairs.
#[cfg(any(test, feature = "mock"))]
#[must_use]
pub fn parse_authorization_header(header: &str) -> Vec<(String, String)> {
    header
        .trim_start_matches("OAuth ")
        .split(", ")
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            let value = value.trim_matches('"');
            Some((
                key.to_owned(),
                percent_encoding::percent_decode_str(value)
                    .decode_utf8_lossy()
                    .into_owned(),
            ))
        })
        .collect()
}
