//! # huddle-gateway
//!
//! WebSocket gateway for the group chat: per-socket connections, the
//! registry that relays events to them, request dispatch, and the HTTP
//! upload and media endpoints.

pub mod connection;
pub mod handlers;
pub mod protocol;
pub mod registry;
pub mod server;

pub use server::{create_app, create_gateway_state, run, serve, GatewayState};
