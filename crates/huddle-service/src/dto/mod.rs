//! Data Transfer Objects for the gateway protocol
//!
//! Request payloads decoded from clients and the response and event payloads
//! written back.

pub mod requests;
pub mod responses;

pub use requests::*;
pub use responses::*;
