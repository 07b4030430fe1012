use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;

use tapline_core::config::{DeviceFamily, SessionConfig};
use tapline_core::lifecycle::{HostHandle, HostLaunch, Toolchain};

use crate::fake_host::{HostBehavior, SumAppHost, SumAppState};

/// A recorded [`Toolchain`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainCall {
    Search(String),
    ResetSimulator,
    Build { project: PathBuf, device: DeviceFamily },
    LaunchHost(HostLaunch),
    DismissSimulator,
}

/// What `launch_host` does.
#[derive(Debug, Clone)]
pub enum LaunchMode {
    /// Spawn a [`SumAppHost`] on the launch's result directory.
    SumApp(HostBehavior),
    /// Fail with this message.
    Fail(String),
}

type SearchScript = VecDeque<std::result::Result<Vec<PathBuf>, String>>;

/// Scripted [`Toolchain`].
///
/// Search results are queued per file name. Each search pops the queue
/// until one entry is left, which then repeats; unscripted names find
/// nothing.
pub struct FakeToolchain {
    calls: Mutex<Vec<ToolchainCall>>,
    searches: Mutex<HashMap<String, SearchScript>>,
    build_result: std::result::Result<bool, String>,
    launch: LaunchMode,
    hosts: Mutex<Vec<Arc<Mutex<SumAppState>>>>,
}

impl std::fmt::Debug for FakeToolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeToolchain")
            .field("calls", &self.calls.lock().unwrap().len())
            .field("launch", &self.launch)
            .finish()
    }
}

impl Default for FakeToolchain {
    fn default() -> Self {
        Self {
            calls: Mutex::default(),
            searches: Mutex::default(),
            build_result: Ok(true),
            launch: LaunchMode::SumApp(HostBehavior::default()),
            hosts: Mutex::default(),
        }
    }
}

impl FakeToolchain {
    pub const SAMPLE_PROJECT: &'static str = "/Users/dev/TestApp/TestApp.xcodeproj";
    pub const SAMPLE_ARTIFACT: &'static str = "/Users/dev/Library/Developer/Xcode/DerivedData/TestApp-abc/Build/Products/Debug-iphonesimulator/TestApp.app";

    /// Nothing scripted: every search comes back empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// The project and the compiled app are found on the first search.
    pub fn sample_app() -> Self {
        Self::new()
            .with_search(
                SessionConfig::DEFAULT_PROJECT_FILE_NAME,
                vec![PathBuf::from(Self::SAMPLE_PROJECT)],
            )
            .with_search(
                SessionConfig::DEFAULT_APP_BUNDLE_NAME,
                vec![PathBuf::from(Self::SAMPLE_ARTIFACT)],
            )
    }

    pub fn with_search(self, file_name: &str, hits: Vec<PathBuf>) -> Self {
        self.push_search(file_name, Ok(hits))
    }

    pub fn with_search_error(self, file_name: &str, message: &str) -> Self {
        self.push_search(file_name, Err(message.to_owned()))
    }

    fn push_search(self, file_name: &str, entry: std::result::Result<Vec<PathBuf>, String>) -> Self {
        self.searches
            .lock()
            .unwrap()
            .entry(file_name.to_owned())
            .or_default()
            .push_back(entry);
        self
    }

    /// `Ok(false)` is a failed build; `Err` means the tool could not run.
    pub fn with_build_result(mut self, result: std::result::Result<bool, String>) -> Self {
        self.build_result = result;
        self
    }

    pub fn with_launch(mut self, launch: LaunchMode) -> Self {
        self.launch = launch;
        self
    }

    pub fn calls(&self) -> Vec<ToolchainCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn search_count(&self, file_name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ToolchainCall::Search(name) if name == file_name))
            .count()
    }

    /// Launches recorded so far.
    pub fn launches(&self) -> Vec<HostLaunch> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ToolchainCall::LaunchHost(launch) => Some(launch),
                _ => None,
            })
            .collect()
    }

    /// App state of every host launched, oldest first.
    pub fn host_states(&self) -> Vec<Arc<Mutex<SumAppState>>> {
        self.hosts.lock().unwrap().clone()
    }

    fn record(&self, call: ToolchainCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Toolchain for FakeToolchain {
    fn name(&self) -> &str {
        "fake"
    }

    async fn search(&self, file_name: &str) -> Result<Vec<PathBuf>> {
        self.record(ToolchainCall::Search(file_name.to_owned()));
        let mut searches = self.searches.lock().unwrap();
        let entry = match searches.get_mut(file_name) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        match entry {
            Some(Ok(hits)) => Ok(hits),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(Vec::new()),
        }
    }

    async fn reset_simulator(&self) -> Result<()> {
        self.record(ToolchainCall::ResetSimulator);
        Ok(())
    }

    async fn build(&self, project: &Path, _build_args: &[String], device: DeviceFamily) -> Result<bool> {
        self.record(ToolchainCall::Build {
            project: project.to_path_buf(),
            device,
        });
        self.build_result.clone().map_err(|message| anyhow!(message))
    }

    async fn launch_host(&self, launch: &HostLaunch) -> Result<Box<dyn HostHandle>> {
        self.record(ToolchainCall::LaunchHost(launch.clone()));
        match &self.launch {
            LaunchMode::Fail(message) => bail!("{message}"),
            LaunchMode::SumApp(behavior) => {
                let host = SumAppHost::spawn(&launch.results_dir, behavior.clone());
                self.hosts.lock().unwrap().push(host.state_handle());
                Ok(Box::new(host))
            }
        }
    }

    async fn dismiss_simulator(&self) -> Result<()> {
        self.record(ToolchainCall::DismissSimulator);
        Ok(())
    }
}
