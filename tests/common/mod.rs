//! Shared test utilities for signal-history
//!
//! This module provides common helpers for integration tests:
//! - Tracing setup and recorder/runtime construction
//! - Gate orderings for steering async interleavings

pub mod determinism;

use serde_json::Value;
use signal_history::testing::MockRuntime;
use signal_history::{Recorder, RecorderConfig};

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A fresh recorder and a runtime over `initial` state.
pub fn runtime_with(initial: Value) -> (Recorder, MockRuntime) {
    init_tracing();
    let recorder = Recorder::new(RecorderConfig::default().with_label("integration"));
    let runtime = MockRuntime::new(recorder.clone(), initial);
    (recorder, runtime)
}
