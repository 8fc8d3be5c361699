//! Connection management
//!
//! A [`Connection`] per socket, and the pending upload table correlating
//! deferred binary payloads with the request that announced them.

mod connection;
mod pending;

pub use connection::{Connection, ConnectionError, ConnectionState, WsSink};
pub use pending::{PendingRequest, PendingUpload, PendingUploads, SWEEP_INTERVAL};

#[cfg(test)]
pub(crate) use connection::tests::test_connection;
