//! History store: the append-only, two-view log of signal executions.

mod branch;
mod record;
mod snapshot;
mod store;

pub use branch::{BranchNode, BranchPath, BranchStep};
pub use record::{
    display_path, ActionId, ActionRecord, MutationRecord, PathSegment, SignalId, SignalInput,
    SignalRecord,
};
pub use snapshot::{BranchSnapshot, SignalSnapshot, StoreRef};
pub use store::HistoryStore;
