//! Domain errors and the error codes clients see

mod domain_error;

pub use domain_error::{DomainError, ErrorCode};
