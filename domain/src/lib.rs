//! Domain library for the user repository workspace.
//!
//! Holds the `User` entity, the backend `Configuration` mapping, the
//! `UserRepository` port and the error type shared by every adapter. Keep
//! storage clients and IO concerns out of this crate; adapters live in their
//! own crates (the in-memory one in `adapters` is the exception).

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// A user record.
///
/// `id` is `None` until a repository has persisted the user. Once assigned it
/// never changes, only `name` may be mutated.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: Option<u64>,
    pub name: String,
}

impl User {
    /// An unsaved user carrying only a name.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    /// A user as returned by a repository.
    pub fn with_id<S: Into<String>>(id: u64, name: S) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
        }
    }

    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }

    pub fn rename<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }
}

impl Display for User {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "id: {}, name: {}", id, self.name),
            None => write!(f, "id: None, name: {}", self.name),
        }
    }
}

/// Opaque backend parameters (connection strings, hosts, keys).
///
/// Built once by the composition root and shared read-only by every provider
/// that needs it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration(BTreeMap<String, String>);

impl Configuration {
    /// SQLite path, or `:memory:`.
    pub const DB_CONNECTION_STRING: &'static str = "db_connection_string";
    /// Redis connection URL, e.g. `redis://127.0.0.1/`.
    pub const REDIS_URL: &'static str = "redis_url";
    /// Key of the Redis list holding user names.
    pub const REDIS_KEY: &'static str = "redis_key";

    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Like `get`, but a missing key is a `ConfigurationMissing` error.
    pub fn require(&self, key: &str) -> Result<&str, CoreError> {
        self.get(key)
            .ok_or_else(|| CoreError::ConfigurationMissing(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Repository port for persisting and loading users.
///
/// Not-found is `Ok(None)` on every backend. Ordering of `all` is
/// backend-defined; each adapter documents its own.
pub trait UserRepository: Send + Sync {
    /// First user whose name matches exactly.
    fn find_by_name(&self, name: &str) -> Result<Option<User>, CoreError>;
    fn all(&self) -> Result<Vec<User>, CoreError>;
    /// Persist an unsaved user and return it with its assigned id.
    fn create(&self, user: &User) -> Result<User, CoreError>;
    /// Overwrite the stored name of an existing user and return the stored record.
    fn update(&self, user: &User) -> Result<User, CoreError>;
}

/// Core domain errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),
    #[error("not found")]
    NotFound,
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("user has no id")]
    Unsaved,
    #[error("user already has an id")]
    AlreadySaved,
    #[error("invalid name: {0}")]
    InvalidName(String),
}

impl CoreError {
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        CoreError::BackendUnavailable(msg.into())
    }
}

/// Check the preconditions `create` shares across backends.
pub fn ensure_unsaved(user: &User) -> Result<(), CoreError> {
    if user.is_saved() {
        return Err(CoreError::AlreadySaved);
    }
    Ok(())
}

/// Return the id `update` must target, or `Unsaved`.
pub fn require_id(user: &User) -> Result<u64, CoreError> {
    user.id.ok_or(CoreError::Unsaved)
}

pub mod adapters;
pub mod service;
pub mod validate;
