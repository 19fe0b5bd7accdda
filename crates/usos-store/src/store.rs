//! Store traits and the records they hold.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Local administrative role of a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Admin,
}

impl Role {
    /// Stored and serialized name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "admin" => Ok(Self::Admin),
            other => Err(StoreError::InvalidRole(other.to_owned())),
        }
    }
}

/// A user identity resolved from USOS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub usos_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields written on every login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub usos_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

/// Durable access credentials for one user.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub usos_id: String,
    pub access_token: String,
    pub access_token_secret: String,
    /// Pipe-delimited scopes as granted.
    pub scopes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("usos_id", &self.usos_id)
            .field("access_token", &"<redacted>")
            .field("access_token_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

/// Credential fields written at the end of a handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct NewCredential {
    pub access_token: String,
    pub access_token_secret: String,
    pub scopes: String,
}

impl fmt::Debug for NewCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewCredential")
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

/// Storage error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database query or connection error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A stored role is not recognized.
    #[error("invalid role: {0}")]
    InvalidRole(String),

    /// The referenced user does not exist.
    #[error("user not found: {0}")]
    UserNotFound(String),
}

/// User identity storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert or update profile fields keyed by `usos_id`.
    ///
    /// The role of an existing user is never changed.
    async fn upsert_user(&self, user: &NewUser) -> Result<User, StoreError>;

    /// Look up a user.
    async fn find_user(&self, usos_id: &str) -> Result<Option<User>, StoreError>;

    /// Change a user's role.
    ///
    /// Returns [`StoreError::UserNotFound`] if there is no such user.
    async fn set_role(&self, usos_id: &str, role: Role) -> Result<User, StoreError>;
}

/// OAuth credential storage, at most one record per user.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Overwrite the user's credential in full.
    async fn save_credential(
        &self,
        usos_id: &str,
        credential: &NewCredential,
    ) -> Result<Credential, StoreError>;

    /// Look up the user's credential.
    async fn find_credential(&self, usos_id: &str) -> Result<Option<Credential>, StoreError>;

    /// Delete the user's credential. Returns `true` if one existed.
    async fn delete_credential(&self, usos_id: &str) -> Result<bool, StoreError>;
}

/// Combined store used by the server.
#[async_trait]
pub trait Store: UserStore + CredentialStore {
    /// Upsert the user and overwrite their credential as one unit.
    ///
    /// Either both writes are visible afterwards or neither is.
    async fn persist_login(
        &self,
        user: &NewUser,
        credential: &NewCredential,
    ) -> Result<User, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_names() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::Student.to_string(), "student");
        assert!(matches!(
            "root".parse::<Role>(),
            Err(StoreError::InvalidRole(r)) if r == "root"
        ));
    }

    #[test]
    fn test_credential_debug_redacts_secrets() {
        let credential = Credential {
            usos_id: "1".to_owned(),
            access_token: "token-value".to_owned(),
            access_token_secret: "secret-value".to_owned(),
            scopes: "studies".to_owned(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let debug = format!("{credential:?}");
        assert!(!debug.contains("token-value"));
        assert!(!debug.contains("secret-value"));
        assert!(debug.contains("studies"));
    }

    #[test]
    fn test_user_serializes_role_lowercase() {
        let user = User {
            usos_id: "1".to_owned(),
            first_name: "Jan".to_owned(),
            last_name: "Kowalski".to_owned(),
            email: None,
            role: Role::Admin,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains(r#""role":"admin""#));
    }
}
