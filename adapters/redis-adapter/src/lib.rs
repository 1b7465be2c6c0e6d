//! redis-adapter — Redis list implementation of the `UserRepository` port.
//!
//! Layout
//! - All names live in one list under a fixed key (default `users`).
//! - `create` pushes to the head, so the list is newest-first.
//! - Ids are positional: with list length `len`, the element at index `i` has
//!   id `len - i`. The adapter only ever pushes to the head, so an id keeps
//!   pointing at the same element until the list is flushed. Removing or
//!   inserting elements from another client shifts every later id.
//!
//! Ordering of `all()` is newest first (descending id). `find_by_name` returns
//! the newest user with a matching name.
//!
//! Notes
//! - Uses the blocking `redis` client; one connection is held for the life of
//!   the repository.
//! - Store access goes through `ListCommands` so the positional logic can run
//!   against an in-process list in tests.

use std::sync::{Mutex, MutexGuard};

use domain::{ensure_unsaved, require_id, Configuration, CoreError, User, UserRepository};
use redis::RedisResult;
use tracing::{debug, info, warn};

/// List key used when the configuration does not name one.
pub const DEFAULT_KEY: &str = "users";

/// The handful of list commands the repository needs.
pub trait ListCommands: Send {
    /// Push to the head; returns the new length.
    fn lpush(&mut self, key: &str, value: &str) -> RedisResult<usize>;
    fn llen(&mut self, key: &str) -> RedisResult<usize>;
    /// Whole list, head first.
    fn lrange(&mut self, key: &str) -> RedisResult<Vec<String>>;
    fn lset(&mut self, key: &str, index: usize, value: &str) -> RedisResult<()>;
    fn del(&mut self, key: &str) -> RedisResult<()>;
}

impl ListCommands for redis::Connection {
    fn lpush(&mut self, key: &str, value: &str) -> RedisResult<usize> {
        redis::Commands::lpush(self, key, value)
    }

    fn llen(&mut self, key: &str) -> RedisResult<usize> {
        redis::Commands::llen(self, key)
    }

    fn lrange(&mut self, key: &str) -> RedisResult<Vec<String>> {
        redis::Commands::lrange(self, key, 0, -1)
    }

    fn lset(&mut self, key: &str, index: usize, value: &str) -> RedisResult<()> {
        redis::Commands::lset(self, key, index as isize, value)
    }

    fn del(&mut self, key: &str) -> RedisResult<()> {
        redis::Commands::del(self, key)
    }
}

/// Redis-backed user repository.
pub struct RedisUserRepo<C: ListCommands = redis::Connection> {
    commands: Mutex<C>,
    key: String,
}

impl RedisUserRepo<redis::Connection> {
    /// Open a connection to `url` and store users under `key`.
    pub fn connect(url: &str, key: impl Into<String>) -> Result<Self, CoreError> {
        let client = redis::Client::open(url).map_err(map_rderr)?;
        let conn = client.get_connection().map_err(map_rderr)?;
        let key = key.into();
        info!(%key, "redis user repository connected");
        Ok(Self::with_commands(conn, key))
    }

    /// Construct from `redis_url` (required) and `redis_key` (optional).
    pub fn from_config(cfg: &Configuration) -> Result<Self, CoreError> {
        let url = cfg.require(Configuration::REDIS_URL)?;
        let key = cfg.get(Configuration::REDIS_KEY).unwrap_or(DEFAULT_KEY);
        Self::connect(url, key)
    }
}

impl<C: ListCommands> RedisUserRepo<C> {
    pub fn with_commands(commands: C, key: impl Into<String>) -> Self {
        Self {
            commands: Mutex::new(commands),
            key: key.into(),
        }
    }

    /// Delete the whole collection. Ids restart at 1 afterwards.
    pub fn flush(&self) -> Result<(), CoreError> {
        let mut cmds = self.lock()?;
        cmds.del(&self.key).map_err(map_rderr)?;
        warn!(key = %self.key, "redis user list flushed");
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, C>, CoreError> {
        self.commands
            .lock()
            .map_err(|_| CoreError::backend("mutex poisoned"))
    }
}

fn map_rderr(e: redis::RedisError) -> CoreError {
    CoreError::BackendUnavailable(format!("redis error: {e}"))
}

/// Pair each list element with its positional id.
fn with_positional_ids(names: Vec<String>) -> Vec<User> {
    let len = names.len();
    names
        .into_iter()
        .enumerate()
        .map(|(i, name)| User::with_id((len - i) as u64, name))
        .collect()
}

impl<C: ListCommands> UserRepository for RedisUserRepo<C> {
    fn find_by_name(&self, name: &str) -> Result<Option<User>, CoreError> {
        Ok(self.all()?.into_iter().find(|u| u.name == name))
    }

    fn all(&self) -> Result<Vec<User>, CoreError> {
        let names = self.lock()?.lrange(&self.key).map_err(map_rderr)?;
        Ok(with_positional_ids(names))
    }

    fn create(&self, user: &User) -> Result<User, CoreError> {
        ensure_unsaved(user)?;
        let len = self
            .lock()?
            .lpush(&self.key, &user.name)
            .map_err(map_rderr)?;
        debug!(id = len, key = %self.key, "redis user created");
        Ok(User::with_id(len as u64, user.name.clone()))
    }

    fn update(&self, user: &User) -> Result<User, CoreError> {
        let id = require_id(user)?;
        let mut cmds = self.lock()?;
        let len = cmds.llen(&self.key).map_err(map_rderr)? as u64;
        if id == 0 || id > len {
            return Err(CoreError::NotFound);
        }
        let index = (len - id) as usize;
        cmds.lset(&self.key, index, &user.name).map_err(map_rderr)?;
        debug!(id, index, key = %self.key, "redis user updated");
        Ok(User::with_id(id, user.name.clone()))
    }
}
