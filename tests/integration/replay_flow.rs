//! Remembering past state

use serde_json::{json, Map, Value};
use signal_history::testing::{settle, Gate, MockRuntime, Step};
use signal_history::{Recorder, RecorderError, RecorderStatus};

use super::common::determinism::{commit_log, GateSet};
use super::common::runtime_with;

fn end_to_end_runtime(gate: Gate) -> (Recorder, MockRuntime) {
    let (recorder, runtime) = runtime_with(json!({}));
    runtime.add_signal(
        "signalA",
        vec![Step::action("setFalse", |ctx| ctx.set(["foo"], json!(false)).unwrap())],
    );
    runtime.add_signal(
        "signalB",
        vec![Step::async_action("awaitThenSet", move |ctx| {
            let gate = gate.clone();
            async move {
                gate.wait().await;
                ctx.set(["foo"], json!(true)).unwrap();
                Map::new()
            }
        })],
    );
    (recorder, runtime)
}

#[tokio::test]
async fn remember_first_signal_ignores_a_later_suspended_write() {
    let gate = Gate::new();
    let (recorder, runtime) = end_to_end_runtime(gate.clone());

    // B is fired first but only starts on the next scheduler turn; A has no
    // suspension point and completes straight away.
    let b = runtime.trigger("signalB", json!({}));
    runtime.run("signalA", json!({})).await.unwrap();
    settle().await;
    gate.open();
    b.await.unwrap().unwrap();

    assert_eq!(recorder.signal(0).unwrap().name, "signalA");
    assert_eq!(runtime.state(), json!({"foo": true}));

    let report = runtime.remember(0).unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(runtime.state(), json!({"foo": false}));
    assert_eq!(recorder.current_index(), Some(0));

    runtime.remember(1).unwrap();
    assert_eq!(runtime.state(), json!({"foo": true}));
}

#[tokio::test]
async fn remember_replays_by_commit_order_not_start_order() {
    let gate = Gate::new();
    let (recorder, runtime) = end_to_end_runtime(gate.clone());

    // B starts (and takes id 0) before A, but its write commits after A's.
    let b = runtime.trigger("signalB", json!({}));
    settle().await;
    runtime.run("signalA", json!({})).await.unwrap();
    gate.open();
    b.await.unwrap().unwrap();

    assert_eq!(recorder.signal(0).unwrap().name, "signalB");
    runtime.remember(0).unwrap();
    assert_eq!(runtime.state(), json!({"foo": true}));
    runtime.remember(1).unwrap();
    assert_eq!(runtime.state(), json!({"foo": true}));
}

#[tokio::test]
async fn out_of_range_reports_and_keeps_state() {
    let (recorder, runtime) = runtime_with(json!({}));
    runtime.add_signal(
        "write",
        vec![Step::action("set", |ctx| ctx.set(["n"], json!(1)).unwrap())],
    );
    runtime.run("write", json!({})).await.unwrap();

    let err = runtime.remember(3).unwrap_err();
    assert!(matches!(err, RecorderError::OutOfRange { signal_id: 3, len: 1 }));
    assert!(!err.is_fatal());
    assert_eq!(runtime.state(), json!({"n": 1}));
    assert_eq!(recorder.current_index(), None);
    assert_eq!(recorder.status(), RecorderStatus::Recording);
}

#[tokio::test]
async fn async_history_replays_without_suspending() {
    let (recorder, runtime) = runtime_with(json!({"log": []}));
    let gates = GateSet::new(1);
    let gate = gates.get(0);
    runtime.add_signal(
        "fetch",
        vec![
            Step::async_action("request", move |ctx| {
                let gate = gate.clone();
                async move {
                    ctx.push(["log"], json!("requested")).unwrap();
                    gate.wait().await;
                    ctx.push(["log"], json!("received")).unwrap();
                    Map::new()
                }
            }),
            Step::action("finish", |ctx| ctx.push(["log"], json!("done")).unwrap()),
        ],
    );

    let handle = runtime.trigger("fetch", json!({}));
    settle().await;
    gates.open_in_order(&[0]).await;
    handle.await.unwrap().unwrap();
    let finished = runtime.state();

    // Replay is a plain synchronous call; no gate is involved.
    runtime.remember(0).unwrap();
    assert_eq!(runtime.state(), finished);
    assert_eq!(finished, json!({"log": ["requested", "received", "done"]}));
    assert!(!recorder.is_remembering());
}

/// Two signals whose async reads resolve in `order`; their writes always
/// commit `shared = "y"` before `shared = "x"`.
async fn interleaved_run(order: &[usize]) -> (Recorder, Vec<Value>) {
    let (recorder, runtime) = runtime_with(json!({}));
    let gates = GateSet::new(3);

    let (read_x, write_x) = (gates.get(0), gates.get(1));
    runtime.add_signal(
        "x",
        vec![
            Step::async_action("readX", move |_ctx| {
                let gate = read_x.clone();
                async move {
                    gate.wait().await;
                    Map::new()
                }
            }),
            Step::async_action("writeX", move |ctx| {
                let gate = write_x.clone();
                async move {
                    gate.wait().await;
                    ctx.set(["shared"], json!("x")).unwrap();
                    ctx.set(["x"], json!(1)).unwrap();
                    Map::new()
                }
            }),
        ],
    );
    let read_y = gates.get(2);
    runtime.add_signal(
        "y",
        vec![
            Step::async_action("readY", move |_ctx| {
                let gate = read_y.clone();
                async move {
                    gate.wait().await;
                    Map::new()
                }
            }),
            Step::action("writeY", |ctx| {
                ctx.set(["shared"], json!("y")).unwrap();
                ctx.set(["y"], json!(2)).unwrap();
            }),
        ],
    );

    let x = runtime.trigger("x", json!({}));
    let y = runtime.trigger("y", json!({}));
    settle().await;
    gates.open_in_order(order).await;
    x.await.unwrap().unwrap();
    y.await.unwrap().unwrap();

    let mut remembered = Vec::new();
    for id in 0..recorder.len() {
        runtime.remember(id).unwrap();
        remembered.push(runtime.state());
    }
    (recorder, remembered)
}

#[tokio::test]
async fn same_commit_order_gives_same_remembered_state() {
    // X's read resolves before Y's in one run and after it in the other.
    let (first, first_states) = interleaved_run(&[0, 2, 1]).await;
    let (second, second_states) = interleaved_run(&[2, 0, 1]).await;

    assert_eq!(commit_log(&first), commit_log(&second));
    assert_eq!(first_states, second_states);
    assert_eq!(
        first_states.last(),
        Some(&json!({"shared": "x", "x": 1, "y": 2}))
    );
}

#[tokio::test]
async fn clear_waits_for_running_signals() {
    let gate = Gate::new();
    let (recorder, runtime) = end_to_end_runtime(gate.clone());
    let b = runtime.trigger("signalB", json!({}));
    settle().await;

    assert!(matches!(recorder.clear(), Err(RecorderError::SignalsInFlight(1))));
    gate.open();
    b.await.unwrap().unwrap();

    recorder.clear().unwrap();
    assert!(recorder.is_empty());
    assert!(matches!(
        runtime.remember(0),
        Err(RecorderError::OutOfRange { signal_id: 0, len: 0 })
    ));
}
