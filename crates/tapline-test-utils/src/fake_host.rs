use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tapline_core::hook::iphone::main_screen;
use tapline_core::hook::script::{NIL_ELEMENT, STOP_RUN_LOOP};
use tapline_core::lifecycle::HostHandle;
use tapline_core::protocol::CommandResult;
use tapline_core::workspace::{command_file_name, response_file_name};

use crate::memory_store::{document, string_literal};

/// How a [`SumAppHost`] reacts to being shut down.
#[derive(Debug, Clone)]
pub struct HostBehavior {
    /// Never pick up command files, as if the script had hung.
    pub ignore_commands: bool,
    /// Keep running after evaluating `runLoop=false;`.
    pub ignore_stop_command: bool,
    /// Keep running after [`HostHandle::terminate`]; only `kill` stops it.
    pub ignore_terminate: bool,
    pub poll_interval: Duration,
}

impl Default for HostBehavior {
    fn default() -> Self {
        Self {
            ignore_commands: false,
            ignore_stop_command: false,
            ignore_terminate: false,
            poll_interval: Duration::from_millis(5),
        }
    }
}

/// UI state of the sample sum app.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SumAppState {
    pub integer_a: String,
    pub integer_b: String,
    pub result: String,
    /// Every evaluated line, in order.
    pub evaluated: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    IntegerA,
    IntegerB,
    ComputeSum,
    Result,
}

impl Element {
    fn find(locator: &str) -> Option<Self> {
        let locator = locator.trim();
        [
            (&main_screen::INTEGER_A_TEXT_FIELD, Element::IntegerA),
            (&main_screen::INTEGER_B_TEXT_FIELD, Element::IntegerB),
            (&main_screen::COMPUTE_SUM_BUTTON, Element::ComputeSum),
            (&main_screen::RESULT_LABEL, Element::Result),
        ]
        .into_iter()
        .find(|(hook, _)| hook.expression() == locator)
        .map(|(_, element)| element)
    }

    fn name(self) -> &'static str {
        match self {
            Element::IntegerA => "Integer A",
            Element::IntegerB => "Integer B",
            Element::ComputeSum => "Compute Sum",
            Element::Result => "Result",
        }
    }

    fn object(self) -> &'static str {
        match self {
            Element::IntegerA | Element::IntegerB => "[object UIATextField]",
            Element::ComputeSum => "[object UIAButton]",
            Element::Result => "[object UIAStaticText]",
        }
    }
}

fn undefined() -> CommandResult {
    CommandResult::success("undefined")
}

fn no_element(locator: &str) -> CommandResult {
    CommandResult::new(1, format!("TypeError: {} is {NIL_ELEMENT}", locator.trim()))
}

impl SumAppState {
    /// Evaluate one script line the way the bootstrap would against the
    /// sample app.
    pub fn evaluate(&mut self, line: &str) -> CommandResult {
        let line = line.trim();
        self.evaluated.push(line.to_owned());

        if line == STOP_RUN_LOOP {
            return CommandResult::success("false");
        }
        if let Some(literal) = string_literal(line) {
            return CommandResult::success(literal);
        }
        if line.starts_with("delay(") {
            return undefined();
        }
        if line.starts_with("var result = false;") {
            let found = line
                .split_once("var e = ")
                .and_then(|(_, rest)| rest.split_once("; if"))
                .and_then(|(locator, _)| Element::find(locator))
                .is_some();
            return CommandResult::success(found.to_string());
        }
        if let Some((locator, _)) = line.split_once(" == null ||") {
            return CommandResult::success(Element::find(locator).is_none().to_string());
        }

        let Some(body) = line.strip_suffix(';') else {
            return CommandResult::new(1, format!("SyntaxError: {line}"));
        };

        if let Some((locator, argument)) = body.split_once(".setValue(") {
            let Some(element) = Element::find(locator) else {
                return no_element(locator);
            };
            let value = argument
                .strip_suffix(')')
                .and_then(|quoted| quoted.strip_prefix('"'))
                .and_then(|quoted| quoted.strip_suffix('"'))
                .map(|raw| raw.replace("\\\"", "\""))
                .unwrap_or_default();
            match element {
                Element::IntegerA => self.integer_a = value,
                Element::IntegerB => self.integer_b = value,
                Element::ComputeSum | Element::Result => {}
            }
            return undefined();
        }

        if let Some(locator) = body.strip_suffix(".tap()") {
            return match Element::find(locator) {
                Some(Element::ComputeSum) => {
                    self.result = self.sum();
                    undefined()
                }
                Some(_) => undefined(),
                None => no_element(locator),
            };
        }

        if let Some(locator) = body.strip_suffix(".scrollToVisible()") {
            return match Element::find(locator) {
                Some(_) => undefined(),
                None => no_element(locator),
            };
        }

        if let Some(locator) = body.strip_suffix(".value()") {
            return match Element::find(locator) {
                Some(Element::IntegerA) => CommandResult::success(self.integer_a.clone()),
                Some(Element::IntegerB) => CommandResult::success(self.integer_b.clone()),
                Some(Element::Result) => CommandResult::success(self.result.clone()),
                Some(Element::ComputeSum) => CommandResult::success("null"),
                None => no_element(locator),
            };
        }

        if let Some(locator) = body.strip_suffix(".name()") {
            return match Element::find(locator) {
                Some(element) => CommandResult::success(element.name()),
                None => no_element(locator),
            };
        }

        match Element::find(body) {
            Some(element) => CommandResult::success(element.object()),
            None => CommandResult::success(NIL_ELEMENT),
        }
    }

    fn sum(&self) -> String {
        match (self.integer_a.trim().parse::<i64>(), self.integer_b.trim().parse::<i64>()) {
            (Ok(a), Ok(b)) => (a + b).to_string(),
            _ => "NaN".to_owned(),
        }
    }
}

/// In-process automation host serving one workspace directory.
///
/// Picks up `{n}-cmd.txt` in index order, evaluates every line against a
/// [`SumAppState`], and publishes `{n}-resp.txt` atomically.
pub struct SumAppHost {
    state: Arc<Mutex<SumAppState>>,
    stop: CancellationToken,
    exited: CancellationToken,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for SumAppHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SumAppHost")
            .field("exited", &self.exited.is_cancelled())
            .finish()
    }
}

impl SumAppHost {
    /// Start serving `dir` on the current tokio runtime.
    pub fn spawn(dir: impl Into<PathBuf>, behavior: HostBehavior) -> Self {
        let dir = dir.into();
        let state = Arc::new(Mutex::new(SumAppState::default()));
        let stop = CancellationToken::new();
        let exited = CancellationToken::new();

        let task = tokio::spawn({
            let state = Arc::clone(&state);
            let stop = stop.clone();
            let exited = exited.clone();
            async move {
                serve(&dir, &behavior, &state, &stop).await;
                debug!(dir = %dir.display(), "fake automation host exited");
                exited.cancel();
            }
        });

        Self {
            state,
            stop,
            exited,
            task,
        }
    }

    pub fn state(&self) -> SumAppState {
        self.state.lock().unwrap().clone()
    }

    /// Shared handle on the app state; stays valid after the host is moved
    /// into a lifecycle controller.
    pub fn state_handle(&self) -> Arc<Mutex<SumAppState>> {
        Arc::clone(&self.state)
    }
}

async fn serve(
    dir: &Path,
    behavior: &HostBehavior,
    state: &Mutex<SumAppState>,
    stop: &CancellationToken,
) {
    let mut next = 0_i64;
    loop {
        let command = if behavior.ignore_commands {
            None
        } else {
            tokio::fs::read_to_string(dir.join(command_file_name(next))).await.ok()
        };
        if let Some(script) = command {
            let results: Vec<CommandResult> = {
                let mut app = state.lock().unwrap();
                script
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(|line| app.evaluate(line))
                    .collect()
            };
            let stop_requested = script.lines().any(|line| line.trim() == STOP_RUN_LOOP);

            if let Err(e) = publish(dir, next, &results).await {
                warn!(index = next, error = %e, "fake host could not publish response");
            }
            next += 1;

            if stop_requested && !behavior.ignore_stop_command {
                return;
            }
            continue;
        }

        tokio::select! {
            _ = stop.cancelled(), if !behavior.ignore_terminate => return,
            _ = tokio::time::sleep(behavior.poll_interval) => {}
        }
    }
}

async fn publish(dir: &Path, index: i64, results: &[CommandResult]) -> std::io::Result<()> {
    let path = dir.join(response_file_name(index));
    let staging = path.with_extension("txt.tmp");
    tokio::fs::write(&staging, document(results)).await?;
    tokio::fs::rename(&staging, &path).await
}

#[async_trait]
impl HostHandle for SumAppHost {
    fn id(&self) -> Option<u32> {
        None
    }

    fn is_alive(&mut self) -> bool {
        !self.exited.is_cancelled()
    }

    async fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.exited.cancelled())
            .await
            .is_ok()
    }

    async fn terminate(&mut self) -> Result<()> {
        self.stop.cancel();
        Ok(())
    }

    async fn kill(&mut self) -> Result<()> {
        self.task.abort();
        self.exited.cancel();
        Ok(())
    }
}
