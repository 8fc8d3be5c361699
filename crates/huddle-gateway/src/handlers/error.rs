//! Handler error types

use huddle_core::{DomainError, ErrorCode};
use huddle_service::ServiceError;
use thiserror::Error;

use crate::connection::ConnectionError;
use crate::protocol::ProtocolError;

/// Handler error type
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Undecodable frame, unknown type or bad payload
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Request needs an authenticated connection
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Login or registration on a connection that is already logged in
    #[error("Already authenticated")]
    AlreadyAuthenticated,

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Writing to the socket failed
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

impl HandlerError {
    /// Wire code sent in the ErrorResponse
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Protocol(ProtocolError::Encode(_)) => ErrorCode::InternalError,
            Self::Protocol(_) | Self::NotAuthenticated | Self::AlreadyAuthenticated => {
                ErrorCode::InvalidRequest
            }
            Self::Service(e) => e.code(),
            Self::Domain(e) => e.code(),
            Self::Connection(ConnectionError::Closing) => ErrorCode::ConnectionClosing,
            Self::Connection(_) => ErrorCode::InternalError,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.code() == ErrorCode::InternalError
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
