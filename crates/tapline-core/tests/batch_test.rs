//! Batch aggregation: N producers, one round trip, N buckets.

use tapline_core::hook::Hook;
use tapline_core::protocol::{CommandChannel, CommandResult, producer, run_batch};
use tapline_core::ChannelConfig;
use tapline_test_utils::{MemoryStore, echo_line, per_line};

const FIELD: Hook = Hook::from_static("mainWindow.textFields()[0]");
const BUTTON: Hook = Hook::from_static("mainWindow.buttons()[0]");

fn echo_channel() -> (MemoryStore, CommandChannel) {
    let store = MemoryStore::with_responder(per_line(echo_line));
    let channel = CommandChannel::with_store(store.clone(), ChannelConfig::default());
    (store, channel)
}

#[tokio::test]
async fn three_producers_one_round_trip() {
    let (store, mut channel) = echo_channel();

    let buckets = run_batch(
        &mut channel,
        vec![
            producer(|b| {
                b.set_value(&FIELD, "2");
            }),
            producer(|b| {
                b.set_value(&FIELD, "3");
                b.delay(0.5);
            }),
            producer(|b| {
                b.tap(&BUTTON);
            }),
        ],
    )
    .await;

    assert_eq!(store.write_count(), 1);
    assert_eq!(buckets.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(buckets[&0].len(), 1);
    assert_eq!(buckets[&1].len(), 2);
    assert_eq!(buckets[&2], vec![CommandResult::success("ok")]);

    assert!(!channel.is_batching());
    assert!(channel.pending().is_empty());
}

#[tokio::test]
async fn combined_script_interleaves_sentinels() {
    let (store, mut channel) = echo_channel();

    run_batch(
        &mut channel,
        vec![
            producer(|b| {
                b.command("a();");
            }),
            producer(|b| {
                b.command("b();");
            }),
        ],
    )
    .await;

    let (index, text) = store.commands().remove(0);
    assert_eq!(index, 0);
    assert_eq!(
        text,
        "a();\n\"end batched automation command 0\";\nb();\n\"end batched automation command 1\";"
    );
}

#[tokio::test]
async fn producer_with_no_commands_gets_empty_bucket() {
    let (_store, mut channel) = echo_channel();

    let buckets = run_batch(
        &mut channel,
        vec![
            producer(|_| {}),
            producer(|b| {
                b.command("x();");
            }),
        ],
    )
    .await;

    assert!(buckets[&0].is_empty());
    assert_eq!(buckets[&1].len(), 1);
}

#[tokio::test]
async fn swallowed_sentinel_misattributes_later_results() {
    // The host fails to echo sentinel 1, as it would if producer 1's
    // command aborted evaluation of the rest of its block.
    let store = MemoryStore::with_responder(per_line(|line| {
        if line.contains("command 1") {
            CommandResult::new(1, "SyntaxError")
        } else {
            echo_line(line)
        }
    }));
    let mut channel = CommandChannel::with_store(store.clone(), ChannelConfig::default());

    let buckets = run_batch(
        &mut channel,
        vec![
            producer(|b| {
                b.command("a();");
            }),
            producer(|b| {
                b.command("b();");
            }),
            producer(|b| {
                b.command("c();");
            }),
        ],
    )
    .await;

    // Bucket 1 never closes: sentinel 2 is not the expected sentinel, so
    // producer 1 and 2's results are merged and then dropped as trailing.
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[&0], vec![CommandResult::success("ok")]);
    assert!(!buckets.contains_key(&1));
    assert!(!buckets.contains_key(&2));
}

#[tokio::test]
async fn batch_indices_continue_channel_sequence() {
    let (store, mut channel) = echo_channel();

    channel.dispatch("before();").await;
    run_batch(
        &mut channel,
        vec![producer(|b| {
            b.command("inside();");
        })],
    )
    .await;
    channel.dispatch("after();").await;

    assert_eq!(store.indices(), vec![0, 1, 2]);
}
