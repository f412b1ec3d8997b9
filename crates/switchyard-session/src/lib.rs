//! # switchyard-session
//!
//! The process-wide session: bearer credential plus identity, mirrored into
//! durable storage and observable through an "authenticated" signal.
//!
//! - [`SessionStore`]: establish / clear / read / observe
//! - [`storage`]: the [`DurableStorage`] trait and its memory and JSON-file
//!   backends; [`sqlite`] adds a `SQLite` backend
//! - [`ApiClient`]: gateway requests with the bearer credential; a `401`
//!   clears the session
//! - [`IdentityClient`]: password-grant login that establishes the session

#![deny(unsafe_code)]

pub mod api;
pub mod errors;
pub mod identity;
pub mod sqlite;
pub mod storage;
pub mod store;

pub use api::ApiClient;
pub use errors::{ApiError, StorageError};
pub use identity::{IdentityClient, TokenResponse};
pub use sqlite::SqliteStorage;
pub use storage::{DurableStorage, JsonFileStorage, MemoryStorage};
pub use store::{CREDENTIAL_KEY, IDENTITY_KEY, Session, SessionStore};
