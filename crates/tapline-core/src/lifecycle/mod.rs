//! Session lifecycle: bring the automation host up and tear it down.
//!
//! ```text
//! start_session
//!   1. create workspace, stage bootstrap + response writer (+ template)
//!   2. reset simulator state
//!   3. resolve project (override, else search)
//!   4. build for the device family
//!   5. locate the compiled .app (N attempts, fixed delay)
//!   6. launch host, attach channel to the workspace
//!
//! stop_session
//!   1. drop queued batch commands, send the stop-run-loop command
//!   2. wait for exit, else terminate, else kill
//!   3. quit the simulator, detach channel, remove workspace
//! ```
//!
//! The stop command and the wait for exit share one shutdown timeout.

pub mod host;
pub mod toolchain;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub use host::{ChildHost, HostHandle};
pub use toolchain::{HostLaunch, Toolchain, XcodeToolchain};

use crate::config::{DeviceFamily, SessionConfig};
use crate::error::LifecycleError;
use crate::hook::script;
use crate::protocol::{CommandChannel, WorkspaceStore};
use crate::workspace::Workspace;

/// How long to wait after SIGTERM before killing the host outright.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

const DERIVED_DATA_MARKER: &str = "DerivedData";
const DSYM_SUFFIX: &str = ".dSYM";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Owns the host process and workspace of at most one live session.
pub struct LifecycleController {
    config: SessionConfig,
    toolchain: Arc<dyn Toolchain>,
    state: SessionState,
    host: Option<Box<dyn HostHandle>>,
    workspace: Option<Workspace>,
    artifact: Option<PathBuf>,
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("toolchain", &self.toolchain.name())
            .field("state", &self.state)
            .field("host_pid", &self.host.as_ref().and_then(|h| h.id()))
            .field("workspace", &self.workspace)
            .finish()
    }
}

impl LifecycleController {
    pub fn new(config: SessionConfig, toolchain: Arc<dyn Toolchain>) -> Self {
        Self {
            config,
            toolchain,
            state: SessionState::NotStarted,
            host: None,
            workspace: None,
            artifact: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Workspace of the current session, if one is up.
    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref()
    }

    /// The app bundle the current session launched.
    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    /// True iff a host process is held and has not exited.
    pub fn is_running(&mut self) -> bool {
        self.host.as_mut().is_some_and(|host| host.is_alive())
    }

    /// Bring a session up and attach `channel` to its workspace.
    ///
    /// Returns immediately if a host is already running. Every error is
    /// logged before it is returned; none of them leave a host behind.
    pub async fn start_session(
        &mut self,
        device: DeviceFamily,
        channel: &mut CommandChannel,
    ) -> Result<(), LifecycleError> {
        if self.is_running() {
            debug!("automation session already running");
            return Ok(());
        }
        if self.host.is_some() || self.workspace.is_some() {
            info!("releasing session whose host has exited");
            self.release(channel);
        }

        info!(device = %device, toolchain = self.toolchain.name(), "starting automation session");
        self.state = SessionState::Starting;

        let workspace = match Workspace::create(&self.config.workspace_root) {
            Ok(ws) => ws,
            Err(e) => return Err(self.abort_start(e, None)),
        };

        let toolchain = Arc::clone(&self.toolchain);
        match bring_up(&self.config, toolchain.as_ref(), device, &workspace).await {
            Ok((artifact, host)) => {
                info!(
                    workspace = %workspace.path().display(),
                    artifact = %artifact.display(),
                    pid = ?host.id(),
                    "automation session running"
                );
                channel.attach(Box::new(WorkspaceStore::new(workspace.clone())));
                self.host = Some(host);
                self.artifact = Some(artifact);
                self.workspace = Some(workspace);
                self.state = SessionState::Running;
                Ok(())
            }
            Err(e) => Err(self.abort_start(e, Some(&workspace))),
        }
    }

    fn abort_start(&mut self, err: LifecycleError, workspace: Option<&Workspace>) -> LifecycleError {
        error!(error = %err, "automation session failed to start");
        if let Some(ws) = workspace {
            if !self.config.keep_workspace {
                if let Err(e) = ws.remove() {
                    warn!(path = %ws.path().display(), error = %e, "failed to remove workspace");
                }
            }
        }
        self.state = SessionState::NotStarted;
        err
    }

    /// Stop the host and release the session.
    ///
    /// The host is first asked to leave its run loop. If it has not exited
    /// within the shutdown timeout it is terminated and, failing that,
    /// killed. Afterwards [`is_running`](Self::is_running) is always false.
    pub async fn stop_session(&mut self, channel: &mut CommandChannel) {
        if self.is_running() {
            self.state = SessionState::Stopping;
            info!("stopping automation session");

            channel.set_batching(false);
            let dropped = channel.take_pending();
            if !dropped.is_empty() {
                warn!(commands = dropped.len(), "dropping unflushed batch");
            }

            let timeout = self.config.shutdown_timeout;
            let started = Instant::now();
            let results = channel.dispatch_within(&script::stop_run_loop(), timeout).await;
            debug!(?results, "stop command answered");

            if let Some(host) = self.host.as_mut() {
                stop_host(host.as_mut(), timeout.saturating_sub(started.elapsed())).await;
            }

            if let Err(e) = self.toolchain.dismiss_simulator().await {
                warn!(error = %format!("{e:#}"), "failed to quit simulator");
            }
        }

        self.release(channel);
        self.state = SessionState::Stopped;
    }

    /// Drop the host handle, unbind the channel and remove the workspace
    /// unless it is kept.
    fn release(&mut self, channel: &mut CommandChannel) {
        self.host = None;
        self.artifact = None;
        channel.detach();
        channel.set_batching(false);
        channel.take_pending();

        if let Some(ws) = self.workspace.take() {
            if self.config.keep_workspace {
                info!(path = %ws.path().display(), "keeping workspace");
            } else if let Err(e) = ws.remove() {
                warn!(path = %ws.path().display(), error = %e, "failed to remove workspace");
            }
        }
    }
}

async fn stop_host(host: &mut dyn HostHandle, timeout: Duration) {
    if host.wait_for_exit(timeout).await {
        debug!("automation host exited after stop command");
        return;
    }

    warn!(
        timeout_secs = timeout.as_secs_f64(),
        "automation host ignored stop command; terminating"
    );
    if let Err(e) = host.terminate().await {
        warn!(error = %format!("{e:#}"), "failed to signal automation host");
    }
    if host.wait_for_exit(TERMINATE_GRACE).await {
        return;
    }

    if let Err(e) = host.kill().await {
        error!(error = %format!("{e:#}"), "failed to kill automation host");
    }
}

async fn bring_up(
    config: &SessionConfig,
    toolchain: &dyn Toolchain,
    device: DeviceFamily,
    workspace: &Workspace,
) -> Result<(PathBuf, Box<dyn HostHandle>), LifecycleError> {
    let assets = workspace.stage_assets(config.trace_template.as_deref())?;

    if let Err(e) = toolchain.reset_simulator().await {
        warn!(error = %format!("{e:#}"), "failed to reset simulator state");
    }

    let project = resolve_project(config, toolchain).await?;
    info!(project = %project.display(), "found Xcode project");

    let built = toolchain
        .build(&project, &config.build_args, device)
        .await
        .map_err(|e| LifecycleError::Build(format!("{e:#}")))?;
    if !built {
        warn!(project = %project.display(), "build tool reported failure; looking for an existing app");
    }

    let artifact = locate_artifact(config, toolchain).await?;

    let launch = HostLaunch {
        artifact: artifact.clone(),
        bootstrap: assets.bootstrap,
        results_dir: workspace.path().to_path_buf(),
        trace_template: assets.trace_template,
    };
    let host = toolchain
        .launch_host(&launch)
        .await
        .map_err(|e| LifecycleError::HostLaunch(format!("{e:#}")))?;

    Ok((artifact, host))
}

async fn resolve_project(
    config: &SessionConfig,
    toolchain: &dyn Toolchain,
) -> Result<PathBuf, LifecycleError> {
    if let Some(path) = &config.project_path {
        return Ok(path.clone());
    }

    let name = &config.project_file_name;
    let hits = toolchain
        .search(name)
        .await
        .map_err(|e| LifecycleError::ProjectNotFound {
            name: name.clone(),
            detail: format!("{e:#}"),
        })?;

    hits.into_iter()
        .next()
        .ok_or_else(|| LifecycleError::ProjectNotFound {
            name: name.clone(),
            detail: "search returned no matches".to_owned(),
        })
}

async fn locate_artifact(
    config: &SessionConfig,
    toolchain: &dyn Toolchain,
) -> Result<PathBuf, LifecycleError> {
    let name = &config.app_bundle_name;
    let attempts = config.artifact_attempts;

    for attempt in 1..=attempts {
        let hits = toolchain
            .search(name)
            .await
            .map_err(|e| LifecycleError::ArtifactNotFound {
                name: name.clone(),
                attempts: attempt,
                detail: format!(": {e:#}"),
            })?;

        if let Some(artifact) = select_artifact(&hits) {
            debug!(attempt, artifact = %artifact.display(), "found compiled app");
            return Ok(artifact);
        }

        debug!(attempt, attempts, "compiled app not indexed yet");
        if attempt < attempts {
            tokio::time::sleep(config.artifact_retry_delay).await;
        }
    }

    Err(LifecycleError::ArtifactNotFound {
        name: name.clone(),
        attempts,
        detail: String::new(),
    })
}

/// Pick the compiled app from search results.
///
/// Only paths under a `DerivedData` directory count. A `.app` bundle is
/// taken as-is; a `.app.dSYM` debug bundle maps to the `.app` next to it.
pub fn select_artifact(hits: &[PathBuf]) -> Option<PathBuf> {
    hits.iter().find_map(|hit| {
        let text = hit.to_string_lossy();
        if !text.contains(DERIVED_DATA_MARKER) {
            return None;
        }
        if text.ends_with(".app") {
            Some(hit.clone())
        } else if text.ends_with(".app.dSYM") {
            text.strip_suffix(DSYM_SUFFIX).map(PathBuf::from)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(raw: &[&str]) -> Vec<PathBuf> {
        raw.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn selects_app_under_derived_data() {
        let hits = paths(&[
            "/Users/dev/Desktop/TestApp.app",
            "/Users/dev/Library/Developer/Xcode/DerivedData/TestApp-abc/Build/Products/Debug-iphonesimulator/TestApp.app",
        ]);
        assert_eq!(select_artifact(&hits), Some(hits[1].clone()));
    }

    #[test]
    fn strips_dsym_suffix() {
        let hits = paths(&["/x/DerivedData/TestApp-abc/Build/TestApp.app.dSYM"]);
        assert_eq!(
            select_artifact(&hits),
            Some(PathBuf::from("/x/DerivedData/TestApp-abc/Build/TestApp.app"))
        );
    }

    #[test]
    fn ignores_other_matches() {
        let hits = paths(&["/x/DerivedData/TestApp.app.zip", "/tmp/TestApp.app"]);
        assert_eq!(select_artifact(&hits), None);
        assert_eq!(select_artifact(&[]), None);
    }
}
