//! Adapters that live inside the domain crate for convenience.
//!
//! The in-memory repository backs unit tests and local demos. SQLite and Redis
//! adapters live in separate crates.

pub mod memory_repo;
