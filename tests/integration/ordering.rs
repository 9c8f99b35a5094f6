//! Integration tests for invocation ordering and stale-result suppression
//!
//! Tests cover:
//! - Overlapping triggers resolving in and out of order
//! - Callbacks firing once per issued call, stale or not
//! - Failure and recovery transitions
//! - Callbacks observing the state write of their own call

use super::test_utils::{Recorder, ScriptedClient, Settled, ADD_TODO};
use mutation_runner::{
    MutationConfig, MutationResult, MutationRunner, MutationState, OperationFailure,
};
use serde_json::json;
use tokio::sync::mpsc;

#[tokio::test]
async fn test_stale_success_is_suppressed_until_latest_settles() {
    let client = ScriptedClient::new();
    let mut recorder = Recorder::new();
    let config = recorder.attach(MutationConfig::new(ADD_TODO));
    let runner = MutationRunner::new(config, Some(client.handle())).unwrap();

    runner.trigger(); // A
    runner.trigger(); // B
    client.wait_for_calls(2).await;

    client.succeed(0, json!({ "id": "x" }));
    assert_eq!(recorder.next().await, Settled::Completed(Some(json!({ "id": "x" }))));
    assert_eq!(runner.result(), Some(MutationResult::Loading));

    client.succeed(1, json!({ "id": "y" }));
    assert_eq!(recorder.next().await, Settled::Completed(Some(json!({ "id": "y" }))));
    assert_eq!(
        runner.state(),
        MutationState {
            called: true,
            loading: false,
            data: Some(json!({ "id": "y" })),
            error: None,
        }
    );
}

#[tokio::test]
async fn test_late_stale_response_does_not_overwrite_newer_result() {
    let client = ScriptedClient::new();
    let mut recorder = Recorder::new();
    let config = recorder.attach(MutationConfig::new(ADD_TODO));
    let runner = MutationRunner::new(config, Some(client.handle())).unwrap();

    runner.trigger();
    runner.trigger();
    client.wait_for_calls(2).await;

    client.succeed(1, json!("newest"));
    assert_eq!(recorder.next().await, Settled::Completed(Some(json!("newest"))));
    assert_eq!(runner.result().unwrap().data(), Some(&json!("newest")));

    client.succeed(0, json!("oldest"));
    assert_eq!(recorder.next().await, Settled::Completed(Some(json!("oldest"))));
    assert_eq!(runner.result().unwrap().data(), Some(&json!("newest")));
}

#[tokio::test]
async fn test_stale_failure_fires_error_callback_only() {
    let client = ScriptedClient::new();
    let mut recorder = Recorder::new();
    let config = recorder.attach(MutationConfig::new(ADD_TODO));
    let runner = MutationRunner::new(config, Some(client.handle())).unwrap();

    runner.trigger();
    runner.trigger();
    client.wait_for_calls(2).await;

    client.succeed(1, json!(2));
    recorder.next().await;

    let failure = OperationFailure::Network("connection reset".to_string());
    client.fail(0, failure.clone());
    assert_eq!(recorder.next().await, Settled::Failed(failure));

    let state = runner.state();
    assert_eq!(state.data, Some(json!(2)));
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_failure_then_retry_clears_error() {
    let client = ScriptedClient::new();
    let mut recorder = Recorder::new();
    let config = recorder.attach(MutationConfig::new(ADD_TODO));
    let runner = MutationRunner::new(config, Some(client.handle())).unwrap();

    runner.trigger();
    client.wait_for_calls(1).await;
    let failure = OperationFailure::Client("rejected".to_string());
    client.fail(0, failure.clone());
    recorder.next().await;

    assert_eq!(runner.result(), Some(MutationResult::Failed(failure)));
    assert!(runner.state().data.is_none());

    runner.trigger();
    let pending = runner.state();
    assert!(pending.loading);
    assert!(pending.error.is_none());

    client.wait_for_calls(2).await;
    client.succeed(1, json!({ "ok": true }));
    recorder.next().await;
    assert_eq!(
        runner.result(),
        Some(MutationResult::Succeeded(Some(json!({ "ok": true }))))
    );
}

#[tokio::test]
async fn test_failure_without_error_callback_lands_in_state() {
    let client = ScriptedClient::new();
    let runner = MutationRunner::new(MutationConfig::new(ADD_TODO), Some(client.handle())).unwrap();
    let mut updates = runner.subscribe();

    runner.trigger();
    client.wait_for_calls(1).await;
    client.fail(0, OperationFailure::Network("down".to_string()));

    updates
        .wait_for(|state| !state.loading && state.called)
        .await
        .unwrap();
    assert!(runner.result().unwrap().error().is_some());
}

#[tokio::test]
async fn test_subscribers_observe_loading_then_outcome() {
    let client = ScriptedClient::new();
    let mut recorder = Recorder::new();
    let config = recorder.attach(MutationConfig::new(ADD_TODO));
    let runner = MutationRunner::new(config, Some(client.handle())).unwrap();
    let mut updates = runner.subscribe();
    assert!(!updates.borrow_and_update().called);

    runner.trigger();
    assert!(updates.has_changed().unwrap());
    assert!(updates.borrow_and_update().loading);

    client.wait_for_calls(1).await;
    client.succeed(0, json!(1));
    recorder.next().await;
    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().data, Some(json!(1)));
}

#[tokio::test]
async fn test_render_pass_sees_current_result() {
    let client = ScriptedClient::new();
    let mut recorder = Recorder::new();
    let config = recorder.attach(MutationConfig::new(ADD_TODO));
    let runner = MutationRunner::new(config, Some(client.handle())).unwrap();

    let trigger = runner.render(|trigger, result| {
        assert!(result.is_none());
        trigger
    });
    trigger.call();
    assert!(runner.render(|_, result| result.unwrap().is_loading()));

    client.wait_for_calls(1).await;
    client.succeed(0, json!("done"));
    recorder.next().await;
    let data = runner.render(|_, result| result.and_then(|r| r.data().cloned()));
    assert_eq!(data, Some(json!("done")));
}

#[tokio::test]
async fn test_ignore_results_still_fires_callbacks() {
    let client = ScriptedClient::new();
    let mut recorder = Recorder::new();
    let config = recorder.attach(MutationConfig::new(ADD_TODO).ignore_results(true));
    let runner = MutationRunner::new(config, Some(client.handle())).unwrap();

    runner.trigger();
    client.wait_for_calls(1).await;
    client.succeed(0, json!({ "id": 1 }));
    assert_eq!(recorder.next().await, Settled::Completed(Some(json!({ "id": 1 }))));
    assert_eq!(runner.result(), None);
}

/// Builds callbacks that capture the state a subscriber sees at the moment
/// each callback runs.
fn observing_config(
    updates: tokio::sync::watch::Receiver<MutationState>,
) -> (MutationConfig, mpsc::UnboundedReceiver<(Settled, MutationState)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let completed_tx = tx.clone();
    let completed_updates = updates.clone();
    let config = MutationConfig::new(ADD_TODO)
        .on_completed(move |data| {
            let seen = completed_updates.borrow().clone();
            let _ = completed_tx.send((Settled::Completed(data.cloned()), seen));
        })
        .on_error(move |failure| {
            let seen = updates.borrow().clone();
            let _ = tx.send((Settled::Failed(failure.clone()), seen));
        });
    (config, rx)
}

#[tokio::test]
async fn test_success_callbacks_see_state_already_written() {
    let client = ScriptedClient::new();
    let mut runner =
        MutationRunner::new(MutationConfig::new(ADD_TODO), Some(client.handle())).unwrap();
    let (config, mut seen) = observing_config(runner.subscribe());
    runner.reconfigure(config, Some(client.handle())).unwrap();

    runner.trigger();
    runner.trigger();
    client.wait_for_calls(2).await;

    client.succeed(0, json!("x"));
    let (settled, state) = seen.recv().await.unwrap();
    assert_eq!(settled, Settled::Completed(Some(json!("x"))));
    assert!(state.loading);
    assert_eq!(state.data, None);

    client.succeed(1, json!("y"));
    let (settled, state) = seen.recv().await.unwrap();
    assert_eq!(settled, Settled::Completed(Some(json!("y"))));
    assert!(!state.loading);
    assert_eq!(state.data, Some(json!("y")));
}

#[tokio::test]
async fn test_error_callbacks_see_state_already_written() {
    let client = ScriptedClient::new();
    let mut runner =
        MutationRunner::new(MutationConfig::new(ADD_TODO), Some(client.handle())).unwrap();
    let (config, mut seen) = observing_config(runner.subscribe());
    runner.reconfigure(config, Some(client.handle())).unwrap();

    runner.trigger();
    runner.trigger();
    client.wait_for_calls(2).await;

    let stale = OperationFailure::Network("timeout".to_string());
    client.fail(0, stale.clone());
    let (settled, state) = seen.recv().await.unwrap();
    assert_eq!(settled, Settled::Failed(stale));
    assert!(state.loading);
    assert!(state.error.is_none());

    let latest = OperationFailure::Client("rejected".to_string());
    client.fail(1, latest.clone());
    let (settled, state) = seen.recv().await.unwrap();
    assert_eq!(settled, Settled::Failed(latest.clone()));
    assert!(!state.loading);
    assert_eq!(state.error, Some(latest));
    assert_eq!(state.data, None);
}
