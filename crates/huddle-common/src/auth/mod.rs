//! Credential helpers: password hashing and random secrets

mod password;
mod token;

pub use password::{hash_password, verify_password, PasswordService};
pub use token::{generate_invite_code, generate_token};
