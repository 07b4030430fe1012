//! Command batching: many producers, one host round trip.
//!
//! Each producer runs with the channel in batching mode, so its commands
//! are queued instead of sent. After every producer a sentinel statement is
//! queued; the host echoes it back as a plain result, which is how the
//! combined result stream is split back into per-producer buckets.
//!
//! The split is purely positional. If a producer's commands stop the host
//! from echoing that producer's sentinel, every later sentinel is matched
//! against the wrong bucket index and the remaining results collapse into
//! one bucket.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::CommandResult;
use super::channel::CommandChannel;
use crate::hook::{Hook, script};

/// Results per producer position.
pub type BatchBuckets = BTreeMap<usize, Vec<CommandResult>>;

/// A unit of batched work. Anything it enqueues on the [`Batch`] lands in
/// the bucket for its position.
pub type Producer<'p> = Box<dyn FnOnce(&mut Batch<'_>) + Send + 'p>;

/// Box a closure as a [`Producer`].
pub fn producer<'p, F>(f: F) -> Producer<'p>
where
    F: FnOnce(&mut Batch<'_>) + Send + 'p,
{
    Box::new(f)
}

pub const SENTINEL_PREFIX: &str = "end batched automation command ";

/// Output text the host echoes for the sentinel after producer `position`.
pub fn sentinel_output(position: usize) -> String {
    format!("{SENTINEL_PREFIX}{position}")
}

/// Statement queued after producer `position`; evaluates to
/// [`sentinel_output`].
pub fn sentinel_statement(position: usize) -> String {
    format!("\"{}\";", sentinel_output(position))
}

/// The view of the channel a producer gets while batching.
///
/// Every method only queues script text; the returned values are the
/// synthetic "batched" placeholders, not host results.
pub struct Batch<'c> {
    channel: &'c mut CommandChannel,
}

impl Batch<'_> {
    /// Queue raw script text.
    pub fn command(&mut self, text: impl Into<String>) -> CommandResult {
        self.channel.enqueue(text)
    }

    pub fn tap(&mut self, hook: &Hook) -> bool {
        self.command(script::tap(hook)).was_successful()
    }

    pub fn scroll_to(&mut self, hook: &Hook) -> bool {
        self.command(script::scroll_to(hook)).was_successful()
    }

    pub fn set_value(&mut self, hook: &Hook, value: &str) -> bool {
        self.command(script::set_value(hook, value)).was_successful()
    }

    pub fn delay(&mut self, seconds: f64) {
        self.command(script::delay(seconds));
    }
}

/// Run `producers` as one combined command and split the results.
///
/// Producers are invoked in order. With every sentinel echoed, the returned
/// map has exactly the keys `0..producers.len()`. An empty producer list
/// returns an empty map without a round trip.
pub async fn run_batch(channel: &mut CommandChannel, producers: Vec<Producer<'_>>) -> BatchBuckets {
    if producers.is_empty() {
        return BatchBuckets::new();
    }

    channel.set_batching(true);
    for (position, produce) in producers.into_iter().enumerate() {
        produce(&mut Batch {
            channel: &mut *channel,
        });
        channel.enqueue(sentinel_statement(position));
    }

    let queued = channel.take_pending();
    channel.set_batching(false);

    let script = queued.join("\n");
    debug!(lines = queued.len(), "dispatching batched script");
    let results = channel.dispatch(&script).await;

    demultiplex(results)
}

/// Split a combined result stream at the echoed sentinels.
pub fn demultiplex(results: Vec<CommandResult>) -> BatchBuckets {
    let mut buckets = BatchBuckets::new();
    let mut position = 0;
    let mut expected = sentinel_output(position);
    let mut current = Vec::new();

    for result in results {
        if result.output == expected {
            buckets.insert(position, std::mem::take(&mut current));
            position += 1;
            expected = sentinel_output(position);
        } else {
            current.push(result);
        }
    }

    if !current.is_empty() {
        warn!(
            dropped = current.len(),
            next_position = position,
            "results after the last echoed sentinel were discarded"
        );
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;

    fn sentinel(position: usize) -> CommandResult {
        CommandResult::success(sentinel_output(position))
    }

    #[test]
    fn sentinel_statement_is_a_string_literal() {
        assert_eq!(sentinel_statement(2), "\"end batched automation command 2\";");
    }

    #[test]
    fn demultiplex_splits_at_sentinels() {
        let results = vec![
            CommandResult::success("a"),
            sentinel(0),
            CommandResult::success("b1"),
            CommandResult::new(1, "b2"),
            sentinel(1),
            sentinel(2),
        ];
        let buckets = demultiplex(results);

        assert_eq!(buckets.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(buckets[&0], vec![CommandResult::success("a")]);
        assert_eq!(
            buckets[&1],
            vec![CommandResult::success("b1"), CommandResult::new(1, "b2")]
        );
        assert!(buckets[&2].is_empty());
    }

    #[test]
    fn demultiplex_ignores_out_of_order_sentinels() {
        // Sentinel 1 arrives while bucket 0 is still open: it is treated as
        // an ordinary result.
        let results = vec![sentinel(1), sentinel(0)];
        let buckets = demultiplex(results);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[&0], vec![sentinel(1)]);
    }

    #[test]
    fn demultiplex_drops_trailing_results() {
        let buckets = demultiplex(vec![sentinel(0), CommandResult::success("orphan")]);
        assert_eq!(buckets.len(), 1);
        assert!(buckets[&0].is_empty());
    }

    #[tokio::test]
    async fn empty_producer_list_makes_no_round_trip() {
        let mut channel = CommandChannel::new(ChannelConfig::default());
        let buckets = run_batch(&mut channel, Vec::new()).await;
        assert!(buckets.is_empty());
        assert_eq!(channel.command_index(), -1);
    }
}
