//! Parking engine storage layer
//!
//! This crate provides the two implementations of the engine's storage
//! traits:
//!
//! - [`PgStore`]: PostgreSQL through sqlx, one database transaction per
//!   engine operation, row locks for allocation and closing
//! - [`MemoryStore`]: in-process state behind an async mutex, used by tests
//!   and local runs
//!
//! It also owns connection pool creation and the SQL migrations.

mod error;
pub mod memory;
pub mod pg_store;
pub mod pool;

pub use memory::MemoryStore;
pub use pg_store::PgStore;
pub use pool::{create_pool, run_migrations};

// Re-export commonly used types
pub use parking_core::{AppError, AppResult};
pub use sqlx::PgPool;
