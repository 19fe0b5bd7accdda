//! Persistent state for the USOS backend-for-frontend.
//!
//! Two records are kept per student:
//!
//! - [`User`]: the identity resolved from USOS plus a local [`Role`]
//! - [`Credential`]: the OAuth access token and secret used to call USOS
//!   on the student's behalf
//!
//! # Architecture
//!
//! The crate provides:
//! - [`UserStore`], [`CredentialStore`] and the combined [`Store`] traits
//! - [`SqliteStore`] backed by `sqlx` with embedded migrations
//! - [`MemoryStore`] for testing (behind `mock` feature flag)

#[cfg(any(test, feature = "mock"))]
mod memory;
mod sqlite;
mod store;

#[cfg(any(test, feature = "mock"))]
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{
    Credential, CredentialStore, NewCredential, NewUser, Role, Store, StoreError, User, UserStore,
};
