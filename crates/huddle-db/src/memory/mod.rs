//! In-process storage with the same transactional semantics as PostgreSQL
//!
//! A transaction holds the state lock for its whole lifetime and works on a
//! private copy, which replaces the shared state on commit. Transactions are
//! therefore serialized, which is enough for tests and single-node setups.

mod state;
mod storage;

pub use storage::{MemoryStorage, MemoryTransaction};
