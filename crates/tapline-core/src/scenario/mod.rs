//! Scenarios: scripted end-to-end checks against the app under test.
//!
//! A [`Scenario`] drives an [`AutomationClient`] and records its outcome in
//! a [`TestLog`]. [`run_scenario`] owns setup and teardown so a scenario
//! only contains its steps.

pub mod registry;
pub mod sample;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

pub use registry::ScenarioRegistry;
pub use sample::{SampleSum, SampleSumSequential};

use crate::client::AutomationClient;
use crate::config::{DeviceFamily, SessionConfig};
use crate::lifecycle::Toolchain;
use crate::report::TestLog;

#[async_trait]
pub trait Scenario: Send + Sync {
    /// Registry key, e.g. `iphone.sample_sum`.
    fn name(&self) -> &str;

    /// One-line summary shown by `tapline list`.
    fn description(&self) -> &str;

    fn device(&self) -> DeviceFamily;

    /// Run the steps against a started session.
    ///
    /// Verification failures belong in `log`; `Err` aborts the scenario and
    /// is logged as an error by the runner.
    async fn run(&self, client: &mut AutomationClient, log: &mut TestLog) -> Result<()>;
}

// Compile-time assertion that Scenario is object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Scenario) {}
};

/// Start a session, run `scenario`, stop the session.
///
/// Every failure ends up in `log`, and teardown runs even when setup or the
/// steps fail. Returns [`TestLog::success`].
pub async fn run_scenario(
    scenario: &dyn Scenario,
    config: SessionConfig,
    toolchain: Arc<dyn Toolchain>,
    log: &mut TestLog,
) -> bool {
    info!(scenario = scenario.name(), device = %scenario.device(), "running scenario");

    log.comment("Beginning test setup.");
    let mut client = AutomationClient::new(config, toolchain);
    match client.start_session(scenario.device()).await {
        Ok(()) => {
            log.comment("Completed test setup.");
            if let Err(e) = scenario.run(&mut client, log).await {
                log.error(format!("{e:#}"));
            }
        }
        Err(e) => log.error(format!("session setup failed: {e}")),
    }

    log.comment("Beginning test teardown.");
    client.stop_session().await;
    log.comment("Completed test teardown.");

    let success = log.success();
    info!(scenario = scenario.name(), success, "scenario finished");
    success
}
