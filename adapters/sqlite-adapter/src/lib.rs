//! sqlite-adapter — SQLite implementation of the `UserRepository` port.
//!
//! Purpose
//! - Provide a file-based (or `:memory:`) relational backend for users.
//! - Implements the `UserRepository` trait from the `domain` crate.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Every statement binds its inputs; names are never formatted into SQL.
//! - `all()` is ordered by id ascending; `find_by_name` returns the lowest id
//!   among equal names.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use domain::{ensure_unsaved, require_id, Configuration, CoreError, User, UserRepository};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

/// SQLite-backed user repository.
///
/// Owns a single connection for its whole lifetime; the connection is closed
/// when the repository is dropped.
pub struct SqliteUserRepo {
    conn: Mutex<Connection>,
}

impl SqliteUserRepo {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    ///
    /// The special path `:memory:` opens a private in-memory database.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(map_sqerr)?;
        init_schema(&conn)?;
        info!(path = %path.display(), "sqlite user repository opened");
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory().map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Construct from the `db_connection_string` configuration entry.
    pub fn from_config(cfg: &Configuration) -> Result<Self, CoreError> {
        let path = cfg.require(Configuration::DB_CONNECTION_STRING)?;
        if path == ":memory:" {
            return Self::in_memory();
        }
        if let Some(dir) = Path::new(path).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .map_err(|e| CoreError::backend(format!("create {}: {e}", dir.display())))?;
            }
        }
        Self::new(path)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|_| CoreError::backend("mutex poisoned"))
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_name ON users(name);
        "#,
    )
    .map_err(map_sqerr)
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::BackendUnavailable(format!("sqlite error: {e}"))
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let id: i64 = row.get(0)?;
    let name: String = row.get(1)?;
    Ok(User::with_id(id as u64, name))
}

fn select_by_id(conn: &Connection, id: u64) -> Result<Option<User>, CoreError> {
    conn.query_row(
        "SELECT id, name FROM users WHERE id = ?1",
        params![id as i64],
        row_to_user,
    )
    .optional()
    .map_err(map_sqerr)
}

impl UserRepository for SqliteUserRepo {
    fn find_by_name(&self, name: &str) -> Result<Option<User>, CoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name FROM users WHERE name = ?1 ORDER BY id LIMIT 1",
            params![name],
            row_to_user,
        )
        .optional()
        .map_err(map_sqerr)
    }

    fn all(&self) -> Result<Vec<User>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, name FROM users ORDER BY id")
            .map_err(map_sqerr)?;
        let rows = stmt.query_map([], row_to_user).map_err(map_sqerr)?;
        let users = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(map_sqerr)?;
        Ok(users)
    }

    fn create(&self, user: &User) -> Result<User, CoreError> {
        ensure_unsaved(user)?;
        let conn = self.lock()?;
        conn.execute("INSERT INTO users(name) VALUES (?1)", params![user.name])
            .map_err(map_sqerr)?;
        let id = conn.last_insert_rowid() as u64;
        debug!(id, "sqlite user created");
        Ok(User::with_id(id, user.name.clone()))
    }

    fn update(&self, user: &User) -> Result<User, CoreError> {
        let id = require_id(user)?;
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE users SET name = ?1 WHERE id = ?2",
                params![user.name, id as i64],
            )
            .map_err(map_sqerr)?;
        if changed == 0 {
            return Err(CoreError::NotFound);
        }
        debug!(id, "sqlite user updated");
        select_by_id(&conn, id)?.ok_or(CoreError::NotFound)
    }
}
