//! Property-based tests for ordering guarantees

use crate::test_utils::{Recorder, ScriptedClient, Settled, ADD_TODO};
use mutation_runner::{MutationConfig, MutationResult, MutationRunner, OperationFailure};
use proptest::prelude::*;
use serde_json::json;

fn outcome_for(index: usize, succeeds: bool) -> MutationResult {
    if succeeds {
        MutationResult::Succeeded(Some(json!({ "call": index })))
    } else {
        MutationResult::Failed(OperationFailure::Client(format!("call {index} failed")))
    }
}

/// Any settle order of N overlapping calls leaves the state at the outcome of
/// the last issued call, and every call reports exactly once.
#[test]
fn test_latest_call_wins_for_any_settle_order() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let strategy = (1usize..8).prop_flat_map(|n| {
        (
            Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
            prop::collection::vec(any::<bool>(), n),
        )
    });

    runner
        .run(&strategy, |(order, successes)| {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();

            rt.block_on(async {
                let client = ScriptedClient::new();
                let mut recorder = Recorder::new();
                let config = recorder.attach(MutationConfig::new(ADD_TODO));
                let mutation = MutationRunner::new(config, Some(client.handle())).unwrap();

                let n = order.len();
                for _ in 0..n {
                    mutation.trigger();
                }
                client.wait_for_calls(n).await;

                let mut reported = Vec::new();
                for &index in &order {
                    if successes[index] {
                        client.succeed(index, json!({ "call": index }));
                    } else {
                        client.fail(
                            index,
                            OperationFailure::Client(format!("call {index} failed")),
                        );
                    }
                    reported.push(recorder.next().await);

                    // Until the newest call settles the visible state stays loading.
                    if !reported_contains_latest(&reported, n, &successes) {
                        assert_eq!(mutation.result(), Some(MutationResult::Loading));
                    }
                }

                assert_eq!(reported.len(), n);
                assert!(recorder.is_quiet().await);
                assert_eq!(mutation.result(), Some(outcome_for(n - 1, successes[n - 1])));
            });

            Ok(())
        })
        .unwrap();
}

fn reported_contains_latest(reported: &[Settled], n: usize, successes: &[bool]) -> bool {
    let latest = if successes[n - 1] {
        Settled::Completed(Some(json!({ "call": n - 1 })))
    } else {
        Settled::Failed(OperationFailure::Client(format!("call {} failed", n - 1)))
    };
    reported.contains(&latest)
}
