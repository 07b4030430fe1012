//! The sample app's sum check: enter two integers, tap Compute Sum, read
//! the result label.

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;

use super::Scenario;
use crate::client::AutomationClient;
use crate::config::DeviceFamily;
use crate::hook::iphone::main_screen;
use crate::protocol::producer;
use crate::report::TestLog;

const VERIFY_REMARK: &str = "Verifying the sum was computed correctly.";

fn random_addend() -> u32 {
    rand::rng().random_range(0..100)
}

/// Enters both addends and taps the button in a single batched round trip.
#[derive(Debug, Clone, Copy)]
pub struct SampleSum {
    a: u32,
    b: u32,
}

impl SampleSum {
    pub fn random() -> Self {
        Self::with_values(random_addend(), random_addend())
    }

    pub fn with_values(a: u32, b: u32) -> Self {
        Self { a, b }
    }
}

#[async_trait]
impl Scenario for SampleSum {
    fn name(&self) -> &str {
        "iphone.sample_sum"
    }

    fn description(&self) -> &str {
        "Add two random integers on the main screen (batched)"
    }

    fn device(&self) -> DeviceFamily {
        DeviceFamily::IPhone
    }

    async fn run(&self, client: &mut AutomationClient, log: &mut TestLog) -> Result<()> {
        let (a, b) = (self.a.to_string(), self.b.to_string());
        log.info(format!("Adding {a} and {b}."));

        let buckets = client
            .run_batch(vec![
                producer(move |batch| {
                    batch.set_value(&main_screen::INTEGER_A_TEXT_FIELD, &a);
                }),
                producer(move |batch| {
                    batch.set_value(&main_screen::INTEGER_B_TEXT_FIELD, &b);
                }),
                producer(|batch| {
                    batch.tap(&main_screen::COMPUTE_SUM_BUTTON);
                }),
            ])
            .await;

        for (position, results) in &buckets {
            if let Some(failed) = results.iter().find(|r| !r.was_successful()) {
                log.warning(format!("batched step {position} reported: {}", failed.output));
            }
        }

        let actual = client
            .get_value(&main_screen::RESULT_LABEL)
            .await
            .unwrap_or_default();
        log.verify((self.a + self.b).to_string(), actual, VERIFY_REMARK);
        Ok(())
    }
}

/// Same check with one host round trip per step.
#[derive(Debug, Clone, Copy)]
pub struct SampleSumSequential {
    a: u32,
    b: u32,
}

impl SampleSumSequential {
    pub fn random() -> Self {
        Self::with_values(random_addend(), random_addend())
    }

    pub fn with_values(a: u32, b: u32) -> Self {
        Self { a, b }
    }
}

#[async_trait]
impl Scenario for SampleSumSequential {
    fn name(&self) -> &str {
        "iphone.sample_sum_sequential"
    }

    fn description(&self) -> &str {
        "Add two random integers on the main screen, one command at a time"
    }

    fn device(&self) -> DeviceFamily {
        DeviceFamily::IPhone
    }

    async fn run(&self, client: &mut AutomationClient, log: &mut TestLog) -> Result<()> {
        if !client.wait_for(&main_screen::COMPUTE_SUM_BUTTON).await? {
            return Err(log.critical_error("main screen never appeared"));
        }

        let steps = [
            (
                "set first addend",
                client
                    .set_value(&main_screen::INTEGER_A_TEXT_FIELD, &self.a.to_string())
                    .await,
            ),
            (
                "set second addend",
                client
                    .set_value(&main_screen::INTEGER_B_TEXT_FIELD, &self.b.to_string())
                    .await,
            ),
            ("tap compute", client.tap(&main_screen::COMPUTE_SUM_BUTTON).await),
        ];
        for (step, ok) in steps {
            log.assert_eq(true, ok, step);
        }

        let actual = client
            .get_value(&main_screen::RESULT_LABEL)
            .await
            .unwrap_or_default();
        log.verify((self.a + self.b).to_string(), actual, VERIFY_REMARK);
        Ok(())
    }
}
