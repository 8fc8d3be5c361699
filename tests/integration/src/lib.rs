//! Integration test utilities for the huddle gateway
//!
//! This crate provides helpers for running end-to-end tests against a live
//! gateway over WebSocket and HTTP.

pub mod helpers;

pub use helpers::*;
