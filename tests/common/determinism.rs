//! Deterministic interleaving helpers
//!
//! Async actions in these tests park on [`Gate`]s; opening gates in a fixed
//! order (with the scheduler settled in between) pins down the real-time
//! interleaving of a run.

use signal_history::testing::{settle, Gate};
use signal_history::{MutationRecord, Recorder};

/// A set of gates addressed by index.
pub struct GateSet {
    gates: Vec<Gate>,
}

impl GateSet {
    pub fn new(count: usize) -> Self {
        Self {
            gates: (0..count).map(|_| Gate::new()).collect(),
        }
    }

    pub fn get(&self, index: usize) -> Gate {
        self.gates[index].clone()
    }

    /// Open gates in `order`, letting the scheduler settle after each one.
    pub async fn open_in_order(&self, order: &[usize]) {
        for &index in order {
            self.gates[index].open();
            settle().await;
        }
    }
}

/// Flat commit log with sequence ids stripped, for comparing two runs.
pub fn commit_log(recorder: &Recorder) -> Vec<(String, String, String)> {
    let Some(last) = recorder.len().checked_sub(1) else {
        return Vec::new();
    };
    recorder
        .flatten(last)
        .expect("history is non-empty")
        .iter()
        .map(|m: &MutationRecord| {
            (
                m.name.clone(),
                signal_history::history::display_path(&m.path),
                serde_json::to_string(&m.args).expect("args serialize"),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn gates_open_in_requested_order() {
        let gates = GateSet::new(2);
        gates.open_in_order(&[1]).await;
        assert!(gates.get(1).is_open());
        assert!(!gates.get(0).is_open());
    }
}
