//! Domain errors
//!
//! Clients only ever receive an [`ErrorCode`]; the message text of a
//! [`DomainError`] stays on the server.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::UnknownVariant;
use crate::value_objects::{Permissions, Snowflake};

/// Error kinds exposed on the wire, in their fixed integer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum ErrorCode {
    InternalError = 0,
    InvalidRequest = 1,
    InvalidToken = 2,
    InvalidCredentials = 3,
    InvalidUsername = 4,
    TakenUsername = 5,
    InvalidInviteCode = 6,
    InvalidCaptcha = 7,
    NoPermission = 8,
    ConnectionClosing = 9,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InternalError => "INTERNAL_ERROR",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::InvalidUsername => "INVALID_USERNAME",
            Self::TakenUsername => "TAKEN_USERNAME",
            Self::InvalidInviteCode => "INVALID_INVITE_CODE",
            Self::InvalidCaptcha => "INVALID_CAPTCHA",
            Self::NoPermission => "NO_PERMISSION",
            Self::ConnectionClosing => "CONNECTION_CLOSING",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for ErrorCode {
    type Error = UnknownVariant;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::InternalError,
            1 => Self::InvalidRequest,
            2 => Self::InvalidToken,
            3 => Self::InvalidCredentials,
            4 => Self::InvalidUsername,
            5 => Self::TakenUsername,
            6 => Self::InvalidInviteCode,
            7 => Self::InvalidCaptcha,
            8 => Self::NoPermission,
            9 => Self::ConnectionClosing,
            _ => {
                return Err(UnknownVariant {
                    kind: "error code",
                    value: i64::from(value),
                })
            }
        })
    }
}

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("User not found: {0}")]
    UserNotFound(Snowflake),

    #[error("Role not found: {0}")]
    RoleNotFound(Snowflake),

    #[error("Channel not found: {0}")]
    ChannelNotFound(Snowflake),

    #[error("Message not found: {0}")]
    MessageNotFound(Snowflake),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    // =========================================================================
    // Authentication Errors
    // =========================================================================
    #[error("Invalid or revoked token")]
    InvalidToken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Captcha verification failed")]
    InvalidCaptcha,

    #[error("Invalid invite code")]
    InvalidInviteCode,

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    #[error("Missing permission: {0:?}")]
    MissingPermission(Permissions),

    #[error("Not message author")]
    NotMessageAuthor,

    #[error("Role hierarchy forbids this change")]
    RankTooLow,

    #[error("Profile change not allowed: {0}")]
    ProfileChangeForbidden(&'static str),

    // =========================================================================
    // Conflict Errors
    // =========================================================================
    #[error("Username already taken")]
    UsernameTaken,

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Connection is closing")]
    ConnectionClosing,

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("External service error: {0}")]
    ExternalError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Wire code for this error. Unknown ids are a malformed request from the
    /// client's point of view.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UserNotFound(_)
            | Self::RoleNotFound(_)
            | Self::ChannelNotFound(_)
            | Self::MessageNotFound(_)
            | Self::InvalidRequest(_) => ErrorCode::InvalidRequest,

            Self::InvalidUsername(_) => ErrorCode::InvalidUsername,
            Self::InvalidToken => ErrorCode::InvalidToken,
            Self::InvalidCredentials => ErrorCode::InvalidCredentials,
            Self::InvalidCaptcha => ErrorCode::InvalidCaptcha,
            Self::InvalidInviteCode => ErrorCode::InvalidInviteCode,

            Self::MissingPermission(_)
            | Self::NotMessageAuthor
            | Self::RankTooLow
            | Self::ProfileChangeForbidden(_) => ErrorCode::NoPermission,

            Self::UsernameTaken => ErrorCode::TakenUsername,
            Self::ConnectionClosing => ErrorCode::ConnectionClosing,

            Self::StorageError(_) | Self::ExternalError(_) | Self::InternalError(_) => {
                ErrorCode::InternalError
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound(_)
                | Self::RoleNotFound(_)
                | Self::ChannelNotFound(_)
                | Self::MessageNotFound(_)
        )
    }

    pub fn is_authorization(&self) -> bool {
        self.code() == ErrorCode::NoPermission
    }

    /// Failures that deserve a server-side error log.
    pub fn is_internal(&self) -> bool {
        self.code() == ErrorCode::InternalError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            DomainError::MessageNotFound(Snowflake::new(1)).code(),
            ErrorCode::InvalidRequest
        );
        assert_eq!(
            DomainError::MissingPermission(Permissions::SEND_MESSAGES).code(),
            ErrorCode::NoPermission
        );
        assert_eq!(DomainError::RankTooLow.code(), ErrorCode::NoPermission);
        assert_eq!(DomainError::UsernameTaken.code(), ErrorCode::TakenUsername);
        assert_eq!(
            DomainError::StorageError("boom".into()).code(),
            ErrorCode::InternalError
        );
    }

    #[test]
    fn test_error_code_wire_values() {
        assert_eq!(serde_json::to_string(&ErrorCode::InternalError).unwrap(), "0");
        assert_eq!(serde_json::to_string(&ErrorCode::NoPermission).unwrap(), "8");
        assert_eq!(
            serde_json::from_str::<ErrorCode>("9").unwrap(),
            ErrorCode::ConnectionClosing
        );
    }

    #[test]
    fn test_classification() {
        assert!(DomainError::UserNotFound(Snowflake::new(1)).is_not_found());
        assert!(DomainError::NotMessageAuthor.is_authorization());
        assert!(DomainError::InternalError("x".into()).is_internal());
        assert!(!DomainError::InvalidCaptcha.is_internal());
    }

    #[test]
    fn test_error_display() {
        let err = DomainError::UserNotFound(Snowflake::new(123));
        assert_eq!(err.to_string(), "User not found: 123");
    }
}
