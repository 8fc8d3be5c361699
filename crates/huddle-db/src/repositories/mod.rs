//! PostgreSQL storage
//!
//! Each entity has a module of query functions taking a `&mut PgConnection`;
//! [`PgTransaction`] binds them to one open database transaction.

mod account;
mod channel;
pub mod error;
mod message;
mod reaction;
mod role;
mod settings;
mod transaction;
mod user;

pub use transaction::{PgStorage, PgTransaction};
