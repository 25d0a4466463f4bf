//! Persistence layer for the tower server.
//!
//! SQLite-backed storage for the append-only audit stream. Hot reads go
//! through the DashMap cache in the state store; the database is the
//! durable record.

pub mod audit;
pub mod db;

pub use db::{init_database, Database};
