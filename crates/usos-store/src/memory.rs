//! In-memory store for testing.
//!
//! Provides [`MemoryStore`] for unit testing without a database.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::store::{
    Credential, CredentialStore, NewCredential, NewUser, Role, Store, StoreError, User, UserStore,
};

/// In-memory store for testing.
///
/// Use the builder methods to seed users and credentials, and
/// [`MemoryStore::fail_writes`] to simulate a database outage.
///
/// # Example
///
/// ```ignore
/// let store = MemoryStore::new()
///     .with_user("100", Role::Admin)
///     .with_credential("100", "token", "secret", "studies");
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, User>>,
    credentials: RwLock<HashMap<String, Credential>>,
    fail_writes: RwLock<bool>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with the given role.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_user(self, usos_id: &str, role: Role) -> Self {
        let now = Utc::now();
        self.users.write().unwrap().insert(
            usos_id.to_owned(),
            User {
                usos_id: usos_id.to_owned(),
                first_name: "Test".to_owned(),
                last_name: "User".to_owned(),
                email: None,
                role,
                created_at: now,
                updated_at: now,
            },
        );
        self
    }

    /// Add a credential for a user.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_credential(
        self,
        usos_id: &str,
        access_token: &str,
        access_token_secret: &str,
        scopes: &str,
    ) -> Self {
        let now = Utc::now();
        self.credentials.write().unwrap().insert(
            usos_id.to_owned(),
            Credential {
                usos_id: usos_id.to_owned(),
                access_token: access_token.to_owned(),
                access_token_secret: access_token_secret.to_owned(),
                scopes: scopes.to_owned(),
                created_at: now,
                updated_at: now,
            },
        );
        self
    }

    /// Make every subsequent write fail.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.write().unwrap() = fail;
    }

    /// Number of stored credentials.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn credential_count(&self) -> usize {
        self.credentials.read().unwrap().len()
    }

    /// Number of stored users.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.read().unwrap().len()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if *self.fail_writes.read().unwrap() {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn upsert_user_sync(&self, user: &NewUser) -> User {
        let now = Utc::now();
        let mut users = self.users.write().unwrap();
        let entry = users
            .entry(user.usos_id.clone())
            .and_modify(|existing| {
                existing.first_name.clone_from(&user.first_name);
                existing.last_name.clone_from(&user.last_name);
                existing.email.clone_from(&user.email);
                existing.updated_at = now;
            })
            .or_insert_with(|| User {
                usos_id: user.usos_id.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                email: user.email.clone(),
                role: Role::Student,
                created_at: now,
                updated_at: now,
            });
        entry.clone()
    }

    fn save_credential_sync(&self, usos_id: &str, credential: &NewCredential) -> Credential {
        let now = Utc::now();
        let mut credentials = self.credentials.write().unwrap();
        let created_at = credentials.get(usos_id).map_or(now, |c| c.created_at);
        let stored = Credential {
            usos_id: usos_id.to_owned(),
            access_token: credential.access_token.clone(),
            access_token_secret: credential.access_token_secret.clone(),
            scopes: credential.scopes.clone(),
            created_at,
            updated_at: now,
        };
        credentials.insert(usos_id.to_owned(), stored.clone());
        stored
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn upsert_user(&self, user: &NewUser) -> Result<User, StoreError> {
        self.check_writable()?;
        Ok(self.upsert_user_sync(user))
    }

    async fn find_user(&self, usos_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().unwrap().get(usos_id).cloned())
    }

    async fn set_role(&self, usos_id: &str, role: Role) -> Result<User, StoreError> {
        self.check_writable()?;
        let mut users = self.users.write().unwrap();
        let user = users
            .get_mut(usos_id)
            .ok_or_else(|| StoreError::UserNotFound(usos_id.to_owned()))?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn save_credential(
        &self,
        usos_id: &str,
        credential: &NewCredential,
    ) -> Result<Credential, StoreError> {
        self.check_writable()?;
        if !self.users.read().unwrap().contains_key(usos_id) {
            return Err(StoreError::UserNotFound(usos_id.to_owned()));
        }
        Ok(self.save_credential_sync(usos_id, credential))
    }

    async fn find_credential(&self, usos_id: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.credentials.read().unwrap().get(usos_id).cloned())
    }

    async fn delete_credential(&self, usos_id: &str) -> Result<bool, StoreError> {
        self.check_writable()?;
        Ok(self.credentials.write().unwrap().remove(usos_id).is_some())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn persist_login(
        &self,
        user: &NewUser,
        credential: &NewCredential,
    ) -> Result<User, StoreError> {
        self.check_writable()?;
        let stored = self.upsert_user_sync(user);
        self.save_credential_sync(&user.usos_id, credential);
        Ok(stored)
    }
}
