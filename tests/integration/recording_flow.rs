//! Signal, action and mutation capture through the mock runtime

use serde_json::json;
use signal_history::testing::{settle, Step};
use signal_history::{PathSegment, RecorderStatus};

use super::common::runtime_with;

#[tokio::test]
async fn every_synchronous_signal_is_stored_in_order() {
    let (recorder, runtime) = runtime_with(json!({"count": 0}));
    runtime.add_signal(
        "increment",
        vec![Step::action("bump", |ctx| {
            let next = ctx.input["by"].as_i64().unwrap_or(1);
            ctx.set(["count"], json!(next)).unwrap();
        })],
    );

    for by in 1..=5 {
        let id = runtime.run("increment", json!({ "by": by })).await.unwrap();
        assert_eq!(id, Some(by as usize - 1));
    }

    let signals = recorder.signals();
    assert_eq!(signals.len(), 5);
    for (index, signal) in signals.iter().enumerate() {
        assert_eq!(signal.id, index);
        assert_eq!(signal.name, "increment");
        let ended = signal.ended_at.expect("signal finished");
        assert!(signal.started_at <= ended);
    }
    assert!(!recorder.is_executing_async());
}

#[tokio::test]
async fn runtime_services_never_reach_recorded_input() {
    let (recorder, runtime) = runtime_with(json!({}));
    runtime.add_service("utils", json!({"http": "client"}));
    runtime.add_signal(
        "clicked",
        vec![Step::action("useUtils", |ctx| {
            assert!(ctx.input.contains_key("utils"));
        })],
    );

    runtime.run("clicked", json!({"foo": true})).await.unwrap();

    let signal = recorder.signal(0).unwrap();
    assert_eq!(serde_json::Value::Object(signal.input), json!({"foo": true}));
}

#[tokio::test]
async fn a_set_call_becomes_one_mutation_on_its_action() {
    let (recorder, runtime) = runtime_with(json!({}));
    runtime.add_signal(
        "save",
        vec![
            Step::noop("before"),
            Step::action("write", |ctx| ctx.set(["foo"], json!("bar")).unwrap()),
        ],
    );

    runtime.run("save", json!({})).await.unwrap();

    let signal = recorder.signal(0).unwrap();
    assert!(signal.branches[0].as_action().unwrap().mutations.is_empty());
    let write = signal.branches[1].as_action().unwrap();
    assert_eq!(write.name, "write");
    assert_eq!(write.mutations.len(), 1);
    let mutation = &write.mutations[0];
    assert_eq!(mutation.name, "set");
    assert_eq!(mutation.path, vec![PathSegment::from("foo")]);
    assert_eq!(mutation.args, vec![json!("bar")]);
}

#[tokio::test]
async fn nested_sequences_and_parallel_groups_keep_their_shape() {
    let (recorder, runtime) = runtime_with(json!({"list": []}));
    runtime.add_signal(
        "shaped",
        vec![
            Step::sequence(vec![
                Step::action("first", |ctx| ctx.push(["list"], json!(1)).unwrap()),
                Step::action("second", |ctx| ctx.push(["list"], json!(2)).unwrap()),
            ]),
            Step::parallel(vec![
                vec![Step::action("left", |ctx| ctx.set(["left"], json!(true)).unwrap())],
                vec![
                    Step::noop("rightA"),
                    Step::action("rightB", |ctx| ctx.set(["right"], json!(true)).unwrap()),
                ],
            ]),
        ],
    );

    runtime.run("shaped", json!({})).await.unwrap();

    let signal = recorder.signal(0).unwrap();
    let sequence = signal.branches[0].children().unwrap();
    assert_eq!(sequence.len(), 2);
    assert_eq!(sequence[1].as_action().unwrap().name, "second");

    let group = &signal.branches[1];
    let members = group.members().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(group.member_action(0).unwrap().name, "left");
    assert_eq!(members[1][1].as_action().unwrap().name, "rightB");

    let names: Vec<_> = signal.actions().iter().map(|a| a.name.clone()).collect();
    assert_eq!(names, ["first", "second", "left", "rightA", "rightB"]);
    assert_eq!(
        runtime.state(),
        json!({"list": [1, 2], "left": true, "right": true})
    );
}

#[tokio::test]
async fn signals_triggered_from_an_action_nest_under_it() {
    let (recorder, runtime) = runtime_with(json!({}));
    runtime.add_signal(
        "child",
        vec![Step::action("mark", |ctx| ctx.set(["child"], json!(true)).unwrap())],
    );
    runtime.add_signal(
        "parent",
        vec![Step::action("spawnChild", |ctx| {
            ctx.trigger("child", json!({"from": "parent"}));
        })],
    );

    runtime.run("parent", json!({})).await.unwrap();
    settle().await;

    let parent = recorder.signal(0).unwrap();
    let spawner = parent.action_named("spawnChild").unwrap();
    assert_eq!(spawner.signals, vec![1]);

    let child = parent.store.signal(1).unwrap();
    assert_eq!(child.parent, Some(spawner.id));
    assert_eq!(child.mutations().len(), 1);
    assert!(spawner.mutations.is_empty());
}

#[tokio::test]
async fn halted_recorder_leaves_the_runtime_running() {
    let (recorder, runtime) = runtime_with(json!({}));
    runtime.add_signal(
        "write",
        vec![Step::action("set", |ctx| ctx.set(["n"], json!(1)).unwrap())],
    );
    runtime.run("write", json!({})).await.unwrap();

    // Ending an action twice breaks the hook contract.
    let action = recorder.signal(0).unwrap().branches[0].as_action().unwrap().id;
    assert!(recorder.end_action(action).unwrap_err().is_fatal());
    assert_eq!(recorder.status(), RecorderStatus::Halted);

    let id = runtime.run("write", json!({})).await.unwrap();
    assert_eq!(id, None);
    assert_eq!(runtime.state(), json!({"n": 1}));
    assert_eq!(recorder.len(), 1);
}
