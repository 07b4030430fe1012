//! The protocol engine: one command in flight, answered through the store.
//!
//! Per command the channel moves through
//!
//! ```text
//! Idle -> CommandWritten -----------------------> ResponseReceived -> Idle
//!                        \-> AwaitingResponse --+-> ResponseReceived -> Idle
//!                                               \-> TimedOut         -> Idle
//! ```
//!
//! `CommandWritten` holds from the write until the first poll. A response
//! found on that poll goes straight to `ResponseReceived`; a miss moves the
//! channel to `AwaitingResponse`. Both are only held inside a dispatch, so
//! callers observe `Idle` plus [`CommandChannel::last_outcome`].
//!
//! Every dispatching method takes `&mut self`, so a second command cannot
//! be issued before the first one resolves.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

use super::CommandResult;
use super::response::parse_response;
use super::store::CommandStore;
use crate::config::ChannelConfig;

/// Where the channel is in the exchange for the current command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    CommandWritten,
    AwaitingResponse,
    ResponseReceived,
    TimedOut,
}

/// Sequential command dispatcher over a [`CommandStore`].
pub struct CommandChannel {
    store: Option<Box<dyn CommandStore>>,
    config: ChannelConfig,
    /// Index of the last dispatched command; -1 before the first one.
    index: i64,
    batching: bool,
    pending: Vec<String>,
    state: ChannelState,
    /// Outcome of the most recent dispatch, kept for diagnostics.
    last_outcome: Option<ChannelState>,
}

impl std::fmt::Debug for CommandChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannel")
            .field("attached", &self.store.is_some())
            .field("index", &self.index)
            .field("batching", &self.batching)
            .field("pending", &self.pending.len())
            .field("state", &self.state)
            .finish()
    }
}

impl CommandChannel {
    /// A channel with no store attached. Dispatches fail until
    /// [`attach`](Self::attach) is called.
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            store: None,
            config,
            index: -1,
            batching: false,
            pending: Vec::new(),
            state: ChannelState::Idle,
            last_outcome: None,
        }
    }

    pub fn with_store(store: impl CommandStore + 'static, config: ChannelConfig) -> Self {
        let mut channel = Self::new(config);
        channel.attach(Box::new(store));
        channel
    }

    /// Bind the channel to a session's store and reset the command index so
    /// the next dispatched command is number 0.
    pub fn attach(&mut self, store: Box<dyn CommandStore>) {
        self.store = Some(store);
        self.index = -1;
        self.state = ChannelState::Idle;
        self.last_outcome = None;
    }

    /// Unbind the store, e.g. after the host has stopped.
    pub fn detach(&mut self) -> Option<Box<dyn CommandStore>> {
        self.store.take()
    }

    pub fn is_attached(&self) -> bool {
        self.store.is_some()
    }

    /// Index of the most recently dispatched command (-1 if none).
    pub fn command_index(&self) -> i64 {
        self.index
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Whether the previous dispatch ended in `ResponseReceived` or `TimedOut`.
    pub fn last_outcome(&self) -> Option<ChannelState> {
        self.last_outcome
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn is_batching(&self) -> bool {
        self.batching
    }

    pub fn set_batching(&mut self, batching: bool) {
        self.batching = batching;
    }

    /// Commands queued while batching, in order.
    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    pub fn take_pending(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
    }

    /// Queue a command without sending it.
    pub fn enqueue(&mut self, text: impl Into<String>) -> CommandResult {
        self.pending.push(text.into());
        CommandResult::batched()
    }

    /// Send one command and wait for its results.
    ///
    /// While batching, the text is queued instead and a single synthetic
    /// success comes back without touching the store. A write failure rolls
    /// the index back so the slot is reused by the next command. When no
    /// response can be parsed before the configured timeout, exactly one
    /// [`CommandResult::no_response`] is returned.
    pub async fn dispatch(&mut self, text: &str) -> Vec<CommandResult> {
        let timeout = self.config.response_timeout;
        self.dispatch_within(text, timeout).await
    }

    /// [`dispatch`](Self::dispatch) with an explicit response timeout.
    pub async fn dispatch_within(&mut self, text: &str, timeout: Duration) -> Vec<CommandResult> {
        if self.batching {
            trace!(pending = self.pending.len(), "queueing batched command");
            return vec![self.enqueue(text)];
        }

        let Some(store) = self.store.as_deref() else {
            error!("dispatch without an attached workspace");
            return vec![CommandResult::failure(CommandResult::NO_SESSION_MESSAGE)];
        };

        let started = Instant::now();
        self.index += 1;
        let index = self.index;

        if let Err(e) = store.write_command(index, text).await {
            error!(index, error = %format!("{e:#}"), "failed to write command");
            self.index -= 1;
            self.state = ChannelState::Idle;
            return vec![CommandResult::failure(format!("{e:#}"))];
        }
        self.state = ChannelState::CommandWritten;
        debug!(index, bytes = text.len(), "command written");

        let deadline = started + timeout;
        let outcome = await_response(
            store,
            &mut self.state,
            index,
            deadline,
            self.config.poll_interval,
        )
        .await;

        let results = match outcome {
            Some(results) => {
                self.state = ChannelState::ResponseReceived;
                debug!(
                    index,
                    results = results.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "response received"
                );
                results
            }
            None => {
                self.state = ChannelState::TimedOut;
                warn!(
                    index,
                    timeout_secs = timeout.as_secs_f64(),
                    "no response from automation host"
                );
                vec![CommandResult::no_response()]
            }
        };

        self.last_outcome = Some(self.state);
        self.state = ChannelState::Idle;
        results
    }
}

/// Poll `store` for response `index` until it parses or `deadline` passes.
///
/// An unreadable or unparseable file counts as "not ready yet"; the host is
/// expected to publish responses atomically, but a partial write only costs
/// another poll. The first miss moves `state` to `AwaitingResponse`.
async fn await_response(
    store: &dyn CommandStore,
    state: &mut ChannelState,
    index: i64,
    deadline: Instant,
    poll_interval: Duration,
) -> Option<Vec<CommandResult>> {
    loop {
        match store.read_response(index).await {
            Ok(Some(raw)) => match parse_response(&raw) {
                Ok(results) => return Some(results),
                Err(e) => trace!(index, error = %e, "response not complete yet"),
            },
            Ok(None) => {}
            Err(e) => trace!(index, error = %format!("{e:#}"), "response not readable yet"),
        }
        *state = ChannelState::AwaitingResponse;

        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}
