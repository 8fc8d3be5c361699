//! Service layer error types
//!
//! Every failure a request can end in, reduced to a wire [`ErrorCode`] by
//! [`ServiceError::code`].

use huddle_common::AppError;
use huddle_core::{DomainError, ErrorCode, Permissions};
use std::fmt;

/// Service layer error type
#[derive(Debug)]
pub enum ServiceError {
    /// Domain rule violation or storage failure
    Domain(DomainError),

    /// Credential helper failure
    App(AppError),

    /// Malformed payload or a reference to something that does not exist
    InvalidRequest(String),

    /// The resolved permission mask lacks a required bit
    PermissionDenied(Permissions),

    /// Role hierarchy or ownership rule failed
    Forbidden(&'static str),

    /// Unexpected invariant violation
    Internal(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(e) => write!(f, "{e}"),
            Self::App(e) => write!(f, "{e}"),
            Self::InvalidRequest(msg) => write!(f, "Invalid request: {msg}"),
            Self::PermissionDenied(perms) => {
                write!(f, "Missing required permission: {}", perms.list().join(", "))
            }
            Self::Forbidden(reason) => write!(f, "Forbidden: {reason}"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Domain(e) => Some(e),
            Self::App(e) => Some(e),
            _ => None,
        }
    }
}

impl ServiceError {
    pub fn no_permission(permission: Permissions) -> Self {
        Self::PermissionDenied(permission)
    }

    pub fn forbidden(reason: &'static str) -> Self {
        Self::Forbidden(reason)
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wire code sent back to the client
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Domain(e) => e.code(),
            Self::App(e) => e.code(),
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::PermissionDenied(_) | Self::Forbidden(_) => ErrorCode::NoPermission,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Failures worth an error log; everything else is an expected outcome.
    pub fn is_internal(&self) -> bool {
        self.code() == ErrorCode::InternalError
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<AppError> for ServiceError {
    fn from(err: AppError) -> Self {
        Self::App(err)
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Fail with [`ServiceError::PermissionDenied`] unless `granted` holds every
/// bit of `required`.
pub fn require(granted: Permissions, required: Permissions) -> ServiceResult<()> {
    if granted.has(required) {
        Ok(())
    } else {
        Err(ServiceError::no_permission(required))
    }
}
