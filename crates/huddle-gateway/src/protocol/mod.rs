//! Wire protocol
//!
//! Frame envelope, event type numbering and the closed set of client
//! requests.

mod envelope;
mod error;
mod event_types;
mod requests;

pub use envelope::{encode, IncomingFrame, OutgoingFrame};
pub use error::ProtocolError;
pub use event_types::EventType;
pub use requests::Request;
