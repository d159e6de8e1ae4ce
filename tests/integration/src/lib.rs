//! Integration test utilities for the node gateway
//!
//! This crate provides helpers for running end-to-end tests against a real
//! gateway server with WebSocket node clients.

pub mod helpers;

pub use helpers::*;
