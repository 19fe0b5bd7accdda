//! `SQLite` store backed by an `sqlx` connection pool.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, Transaction};

use crate::store::{
    Credential, CredentialStore, NewCredential, NewUser, Role, Store, StoreError, User, UserStore,
};

/// Timeout for acquiring a pooled connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

const USER_COLUMNS: &str = "usos_id, first_name, last_name, email, role, created_at, updated_at";
const CREDENTIAL_COLUMNS: &str =
    "usos_id, access_token, access_token_secret, scopes, created_at, updated_at";

#[derive(FromRow)]
struct UserRow {
    usos_id: String,
    first_name: String,
    last_name: String,
    email: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            role: row.role.parse()?,
            usos_id: row.usos_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialRow {
    usos_id: String,
    access_token: String,
    access_token_secret: String,
    scopes: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CredentialRow> for Credential {
    fn from(row: CredentialRow) -> Self {
        Self {
            usos_id: row.usos_id,
            access_token: row.access_token,
            access_token_secret: row.access_token_secret,
            scopes: row.scopes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Store persisting users and credentials in `SQLite`.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `url` and run pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the database cannot be opened,
    /// or a migration fails.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options: SqliteConnectOptions = url.parse()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options.foreign_keys(true))
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::info!(url, "Database ready");
        Ok(store)
    }

    /// Wrap an existing pool. Migrations are not run.
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Migrate`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn upsert_user_in(
        tx: &mut Transaction<'_, Sqlite>,
        user: &NewUser,
        now: DateTime<Utc>,
    ) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (usos_id, first_name, last_name, email, role, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 'student', ?, ?) \
             ON CONFLICT (usos_id) DO UPDATE SET \
                 first_name = excluded.first_name, \
                 last_name = excluded.last_name, \
                 email = excluded.email, \
                 updated_at = excluded.updated_at \
             RETURNING {USER_COLUMNS}"
        );
        let row: UserRow = sqlx::query_as(&sql)
            .bind(&user.usos_id)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.email)
            .bind(now)
            .bind(now)
            .fetch_one(&mut **tx)
            .await?;
        row.try_into()
    }

    async fn save_credential_in(
        tx: &mut Transaction<'_, Sqlite>,
        usos_id: &str,
        credential: &NewCredential,
        now: DateTime<Utc>,
    ) -> Result<Credential, StoreError> {
        let sql = format!(
            "INSERT INTO oauth_credentials \
                 (usos_id, access_token, access_token_secret, scopes, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (usos_id) DO UPDATE SET \
                 access_token = excluded.access_token, \
                 access_token_secret = excluded.access_token_secret, \
                 scopes = excluded.scopes, \
                 updated_at = excluded.updated_at \
             RETURNING {CREDENTIAL_COLUMNS}"
        );
        let row: CredentialRow = sqlx::query_as(&sql)
            .bind(usos_id)
            .bind(&credential.access_token)
            .bind(&credential.access_token_secret)
            .bind(&credential.scopes)
            .bind(now)
            .bind(now)
            .fetch_one(&mut **tx)
            .await?;
        Ok(row.into())
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn upsert_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;
        let stored = Self::upsert_user_in(&mut tx, user, Utc::now()).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn find_user(&self, usos_id: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE usos_id = ?");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(usos_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn set_role(&self, usos_id: &str, role: Role) -> Result<User, StoreError> {
        let sql = format!(
            "UPDATE users SET role = ?, updated_at = ? WHERE usos_id = ? RETURNING {USER_COLUMNS}"
        );
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(role.as_str())
            .bind(Utc::now())
            .bind(usos_id)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| StoreError::UserNotFound(usos_id.to_owned()))?
            .try_into()
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn save_credential(
        &self,
        usos_id: &str,
        credential: &NewCredential,
    ) -> Result<Credential, StoreError> {
        let mut tx = self.pool.begin().await?;
        let stored = Self::save_credential_in(&mut tx, usos_id, credential, Utc::now()).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn find_credential(&self, usos_id: &str) -> Result<Option<Credential>, StoreError> {
        let sql = format!("SELECT {CREDENTIAL_COLUMNS} FROM oauth_credentials WHERE usos_id = ?");
        let row: Option<CredentialRow> = sqlx::query_as(&sql)
            .bind(usos_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Credential::from))
    }

    async fn delete_credential(&self, usos_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM oauth_credentials WHERE usos_id = ?")
            .bind(usos_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn persist_login(
        &self,
        user: &NewUser,
        credential: &NewCredential,
    ) -> Result<User, StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let stored = Self::upsert_user_in(&mut tx, user, now).await?;
        Self::save_credential_in(&mut tx, &user.usos_id, credential, now).await?;
        tx.commit().await?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn memory_store() -> SqliteStore {
        // Each in-memory connection is its own database; keep a single one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(
                "sqlite::memory:"
                    .parse::<SqliteConnectOptions>()
                    .unwrap()
                    .foreign_keys(true),
            )
            .await
            .unwrap();
        let store = SqliteStore::from_pool(pool);
        store.migrate().await.unwrap();
        store
    }

    fn new_user(usos_id: &str, first_name: &str) -> NewUser {
        NewUser {
            usos_id: usos_id.to_owned(),
            first_name: first_name.to_owned(),
            last_name: "Kowalski".to_owned(),
            email: Some(format!("{usos_id}@example.edu")),
        }
    }

    fn new_credential(token: &str) -> NewCredential {
        NewCredential {
            access_token: token.to_owned(),
            access_token_secret: format!("{token}-secret"),
            scopes: "studies|email".to_owned(),
        }
    }

    #[tokio::test]
    async fn test_upsert_inserts_student() {
        let store = memory_store().await;

        let user = store.upsert_user(&new_user("100", "Jan")).await.unwrap();
        assert_eq!(user.usos_id, "100");
        assert_eq!(user.role, Role::Student);

        let found = store.find_user("100").await.unwrap().unwrap();
        assert_eq!(found, user);
    }

    #[tokio::test]
    async fn test_upsert_updates_profile_keeps_role() {
        let store = memory_store().await;
        store.upsert_user(&new_user("100", "Jan")).await.unwrap();
        store.set_role("100", Role::Admin).await.unwrap();

        let user = store.upsert_user(&new_user("100", "Janusz")).await.unwrap();
        assert_eq!(user.first_name, "Janusz");
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_find_user_missing() {
        let store = memory_store().await;
        assert!(store.find_user("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_role_missing_user() {
        let store = memory_store().await;
        let err = store.set_role("nobody", Role::Admin).await.unwrap_err();
        assert!(matches!(err, StoreError::UserNotFound(id) if id == "nobody"));
    }

    #[tokio::test]
    async fn test_credential_overwrite_is_idempotent() {
        let store = memory_store().await;
        store.upsert_user(&new_user("100", "Jan")).await.unwrap();

        store
            .save_credential("100", &new_credential("first"))
            .await
            .unwrap();
        store
            .save_credential("100", &new_credential("second"))
            .await
            .unwrap();
        store
            .save_credential("100", &new_credential("second"))
            .await
            .unwrap();

        let credential = store.find_credential("100").await.unwrap().unwrap();
        assert_eq!(credential.access_token, "second");
        assert_eq!(credential.access_token_secret, "second-secret");

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM oauth_credentials")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_credential_requires_user() {
        let store = memory_store().await;
        let err = store
            .save_credential("ghost", &new_credential("t"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[tokio::test]
    async fn test_delete_credential() {
        let store = memory_store().await;
        store
            .persist_login(&new_user("100", "Jan"), &new_credential("t"))
            .await
            .unwrap();

        assert!(store.delete_credential("100").await.unwrap());
        assert!(!store.delete_credential("100").await.unwrap());
        assert!(store.find_credential("100").await.unwrap().is_none());
        assert!(store.find_user("100").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_persist_login_writes_both() {
        let store = memory_store().await;
        let user = store
            .persist_login(&new_user("100", "Jan"), &new_credential("t"))
            .await
            .unwrap();

        assert_eq!(user.usos_id, "100");
        let credential = store.find_credential("100").await.unwrap().unwrap();
        assert_eq!(credential.access_token, "t");
        assert_eq!(credential.scopes, "studies|email");
    }

    #[tokio::test]
    async fn test_persist_login_twice_keeps_one_credential() {
        let store = memory_store().await;
        store
            .persist_login(&new_user("100", "Jan"), &new_credential("first"))
            .await
            .unwrap();
        store
            .persist_login(&new_user("100", "Jan"), &new_credential("second"))
            .await
            .unwrap();

        let credential = store.find_credential("100").await.unwrap().unwrap();
        assert_eq!(credential.access_token, "second");
        assert_eq!(credential.access_token_secret, "second-secret");

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM oauth_credentials WHERE usos_id = ?")
                .bind("100")
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }
}
