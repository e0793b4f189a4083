pub mod config;
pub mod context;
pub mod error;
pub mod history;
pub mod interceptor;
pub mod recorder;
pub mod replay;
pub mod state;
pub mod testing;

pub use config::{RecorderConfig, TomlConfig, EXAMPLE_CONFIG};
pub use context::{Attributed, ContextExit, ContextGuard, ContextHandle, ContextTracker};
pub use error::{MutationError, RecorderError, Result};
pub use history::{
    ActionId, ActionRecord, BranchNode, BranchPath, BranchSnapshot, BranchStep, MutationRecord,
    PathSegment, SignalId, SignalInput, SignalRecord, SignalSnapshot, StoreRef,
};
pub use interceptor::{MutationInterceptor, Observation, RecordingState, Sequencer, SuspendGuard};
pub use recorder::{Recorder, RecorderStatus};
pub use replay::ReplayReport;
pub use state::{JsonState, StateContainer, StateContainerExt};
