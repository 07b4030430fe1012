//! Typed automation API over one session.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{DeviceFamily, SessionConfig};
use crate::error::{AutomationError, LifecycleError};
use crate::hook::{Hook, script};
use crate::lifecycle::{LifecycleController, Toolchain};
use crate::protocol::{BatchBuckets, CommandChannel, CommandResult, Producer, run_batch};

/// Default host-side bound for [`AutomationClient::wait_for_not_null`].
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// A session: the lifecycle controller plus the channel it attaches.
///
/// Every command method takes `&mut self`, so at most one command is ever
/// in flight.
#[derive(Debug)]
pub struct AutomationClient {
    lifecycle: LifecycleController,
    channel: CommandChannel,
}

impl AutomationClient {
    /// A client whose session has not been started yet.
    pub fn new(config: SessionConfig, toolchain: Arc<dyn Toolchain>) -> Self {
        let channel = CommandChannel::new(config.channel.clone());
        Self::from_parts(LifecycleController::new(config, toolchain), channel)
    }

    /// Build a client and start its session for `device`.
    pub async fn launch(
        config: SessionConfig,
        toolchain: Arc<dyn Toolchain>,
        device: DeviceFamily,
    ) -> Result<Self, LifecycleError> {
        let mut client = Self::new(config, toolchain);
        client.start_session(device).await?;
        Ok(client)
    }

    pub fn from_parts(lifecycle: LifecycleController, channel: CommandChannel) -> Self {
        Self { lifecycle, channel }
    }

    // -----------------------------------------------------------------------
    // Session control
    // -----------------------------------------------------------------------

    pub async fn start_session(&mut self, device: DeviceFamily) -> Result<(), LifecycleError> {
        self.lifecycle.start_session(device, &mut self.channel).await
    }

    pub async fn stop_session(&mut self) {
        self.lifecycle.stop_session(&mut self.channel).await;
    }

    pub fn is_running(&mut self) -> bool {
        self.lifecycle.is_running()
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut CommandChannel {
        &mut self.channel
    }

    // -----------------------------------------------------------------------
    // Raw protocol access
    // -----------------------------------------------------------------------

    /// Send raw script text; one result per evaluated line.
    pub async fn command(&mut self, text: &str) -> Vec<CommandResult> {
        self.channel.dispatch(text).await
    }

    /// Run several producers as one host round trip.
    pub async fn run_batch(&mut self, producers: Vec<Producer<'_>>) -> BatchBuckets {
        run_batch(&mut self.channel, producers).await
    }

    // -----------------------------------------------------------------------
    // Element actions
    // -----------------------------------------------------------------------

    /// Pause the host for `seconds`.
    pub async fn delay(&mut self, seconds: f64) -> bool {
        self.first(&script::delay(seconds)).await.was_successful()
    }

    /// Evaluate the locator itself and return its string form.
    pub async fn get(&mut self, hook: &Hook) -> String {
        self.first(&script::get(hook)).await.output
    }

    pub async fn tap(&mut self, hook: &Hook) -> bool {
        self.first(&script::tap(hook)).await.was_successful()
    }

    pub async fn scroll_to(&mut self, hook: &Hook) -> bool {
        self.first(&script::scroll_to(hook)).await.was_successful()
    }

    pub async fn set_value(&mut self, hook: &Hook, value: &str) -> bool {
        self.first(&script::set_value(hook, value)).await.was_successful()
    }

    /// The element's value, or `None` if the host could not read it.
    pub async fn get_value(&mut self, hook: &Hook) -> Option<String> {
        self.text_of(&script::get_value(hook)).await
    }

    pub async fn get_name(&mut self, hook: &Hook) -> Option<String> {
        self.text_of(&script::get_name(hook)).await
    }

    /// Block on the host until `hook` resolves to a real element or
    /// `timeout_ms` passes on the host's clock.
    pub async fn wait_for_not_null(&mut self, hook: &Hook, timeout_ms: u64) -> Result<bool, AutomationError> {
        self.evaluate_bool(&script::wait_for_not_null(hook, timeout_ms)).await
    }

    /// [`wait_for_not_null`](Self::wait_for_not_null) with
    /// [`DEFAULT_WAIT_TIMEOUT_MS`].
    pub async fn wait_for(&mut self, hook: &Hook) -> Result<bool, AutomationError> {
        self.wait_for_not_null(hook, DEFAULT_WAIT_TIMEOUT_MS).await
    }

    /// Whether `hook` currently resolves to nothing.
    pub async fn check_if_null(&mut self, hook: &Hook) -> Result<bool, AutomationError> {
        self.evaluate_bool(&script::check_if_null(hook)).await
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn first(&mut self, text: &str) -> CommandResult {
        let results = self.channel.dispatch(text).await;
        if results.len() > 1 {
            debug!(extra = results.len() - 1, "ignoring extra results");
        }
        results
            .into_iter()
            .next()
            .unwrap_or_else(|| CommandResult::failure("host returned no results"))
    }

    async fn text_of(&mut self, text: &str) -> Option<String> {
        let result = self.first(text).await;
        if result.was_successful() {
            Some(result.output)
        } else {
            warn!(status = result.status, output = %result.output, "host could not read element");
            None
        }
    }

    async fn evaluate_bool(&mut self, text: &str) -> Result<bool, AutomationError> {
        let result = self.first(text).await;
        if result.was_successful() {
            Ok(result.is_true())
        } else {
            Err(AutomationError::HostEvaluation {
                output: result.output,
            })
        }
    }
}
