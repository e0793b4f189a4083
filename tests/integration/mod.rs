//! Integration tests for signal-history
//!
//! These tests drive a recorder through the mock runtime the way a host
//! runtime would.

#[path = "../common/mod.rs"]
pub mod common;

pub mod recording_flow;
pub mod replay_flow;
