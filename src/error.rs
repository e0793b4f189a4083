//! Error types for the signal history recorder.

use thiserror::Error;

use crate::history::SignalId;

/// Errors raised by the recorder and its components.
#[derive(Error, Debug)]
pub enum RecorderError {
    /// Lifecycle hooks were called out of order by the host runtime.
    ///
    /// Fatal: the recorder halts and stops capturing history.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// `remember` was asked for a signal that is not in the history.
    #[error("Signal {signal_id} is out of range (history holds {len} signals)")]
    OutOfRange { signal_id: SignalId, len: usize },

    /// A context exit arrived for a context that is no longer active.
    #[error("Context {0} was already exited")]
    StaleContextExit(u64),

    /// The recorder halted after a protocol violation.
    #[error("Recorder halted after a protocol violation")]
    Halted,

    /// History cannot be cleared while signals are still running.
    #[error("{0} signal(s) still running")]
    SignalsInFlight(usize),

    /// History cannot be cleared while async actions are suspended.
    #[error("{0} async action(s) still suspended")]
    AsyncInFlight(usize),

    /// The state container rejected a replayed mutation.
    #[error("Mutation error: {0}")]
    Mutation(#[from] MutationError),
}

impl RecorderError {
    /// Whether this error halts the recording subsystem.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecorderError::ProtocolViolation(_))
    }
}

/// Errors raised by a state container when applying a mutation primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("Unknown mutation primitive: {0}")]
    UnknownPrimitive(String),
    #[error("Invalid path {path} for {primitive}")]
    InvalidPath { primitive: String, path: String },
    #[error("Invalid arguments for {primitive}: {reason}")]
    InvalidArguments { primitive: String, reason: String },
}

pub type Result<T> = std::result::Result<T, RecorderError>;
