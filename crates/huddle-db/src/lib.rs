//! # huddle-db
//!
//! Storage layer implementing the `huddle-core` transaction interface.
//!
//! - [`PgStorage`]: PostgreSQL via SQLx, one database transaction per
//!   storage transaction
//! - [`MemoryStorage`]: process-local state with the same semantics, used by
//!   tests and for running without a database
//!
//! ```rust,ignore
//! use huddle_common::DatabaseConfig;
//! use huddle_db::{create_pool, run_migrations, PgStorage};
//!
//! let pool = create_pool(&DatabaseConfig::new(url)).await?;
//! run_migrations(&pool).await?;
//! let storage = PgStorage::new(pool);
//! ```

pub mod mappers;
pub mod memory;
pub mod models;
pub mod pool;
pub mod repositories;

pub use memory::MemoryStorage;
pub use pool::{create_pool, run_migrations, PgPool};
pub use repositories::{PgStorage, PgTransaction};
