//! Client calls whose outcome depends on the host's status code.

use std::sync::Arc;

use tapline_core::hook::iphone::main_screen;
use tapline_core::{
    AutomationClient, AutomationError, ChannelConfig, CommandChannel, CommandResult, LifecycleController,
    SessionConfig,
};
use tapline_test_utils::{FakeToolchain, MemoryStore, document};

/// A client whose every command comes back as a script error.
fn failing_client(output: &'static str) -> (AutomationClient, MemoryStore) {
    let store = MemoryStore::with_responder(move |_, _| Some(document(&[CommandResult::new(1, output)])));
    let lifecycle = LifecycleController::new(SessionConfig::default(), Arc::new(FakeToolchain::new()));
    let channel = CommandChannel::with_store(store.clone(), ChannelConfig::default());
    (AutomationClient::from_parts(lifecycle, channel), store)
}

fn assert_host_evaluation(result: Result<bool, AutomationError>, expected: &str) {
    match result {
        Err(AutomationError::HostEvaluation { output }) => assert_eq!(output, expected),
        other => panic!("expected a host evaluation error, got {other:?}"),
    }
}

#[tokio::test]
async fn wait_for_not_null_surfaces_script_error() {
    let (mut client, store) = failing_client("ReferenceError: x");

    let result = client.wait_for_not_null(&main_screen::RESULT_LABEL, 500).await;
    assert_host_evaluation(result, "ReferenceError: x");
    assert_eq!(store.write_count(), 1);
}

#[tokio::test]
async fn wait_for_surfaces_script_error() {
    let (mut client, _store) = failing_client("ReferenceError: x");

    let result = client.wait_for(&main_screen::RESULT_LABEL).await;
    assert_host_evaluation(result, "ReferenceError: x");
}

#[tokio::test]
async fn check_if_null_surfaces_script_error() {
    let (mut client, _store) = failing_client("TypeError: mainWindow is undefined");

    let result = client.check_if_null(&main_screen::COMPUTE_SUM_BUTTON).await;
    assert_host_evaluation(result, "TypeError: mainWindow is undefined");
}

#[tokio::test]
async fn check_if_null_reads_boolean_output() {
    let store = MemoryStore::with_responder(|_, _| Some(document(&[CommandResult::success("true")])));
    let lifecycle = LifecycleController::new(SessionConfig::default(), Arc::new(FakeToolchain::new()));
    let channel = CommandChannel::with_store(store, ChannelConfig::default());
    let mut client = AutomationClient::from_parts(lifecycle, channel);

    assert!(client.check_if_null(&main_screen::COMPUTE_SUM_BUTTON).await.unwrap());
}
