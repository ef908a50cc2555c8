//! Integration tests for pulse-app.
//!
//! These tests verify the interaction between components:
//! - WebSocket connection lifecycle against a live server
//! - Reconnect and liveness behavior
//! - Projection of live traffic into local mirrors

pub mod common;
