//! Protocol errors

use thiserror::Error;

use super::EventType;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("unassigned event type {0}")]
    UnknownType(u16),

    #[error("{0} cannot be sent by a client")]
    NotARequest(EventType),

    #[error("invalid payload for {kind}: {source}")]
    InvalidPayload {
        kind: EventType,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}
