//! External tools the lifecycle controller shells out to.
//!
//! [`Toolchain`] is the seam between session bring-up logic and the host OS.
//! [`XcodeToolchain`] drives the real macOS tools; tests substitute a
//! scripted implementation.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::host::{ChildHost, HostHandle};
use crate::config::DeviceFamily;

/// Everything needed to start the automation host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLaunch {
    /// The compiled `.app` bundle.
    pub artifact: PathBuf,
    /// Bootstrap script staged in the workspace.
    pub bootstrap: PathBuf,
    /// Directory the host writes its own result bundle into.
    pub results_dir: PathBuf,
    /// Instruments template; `None` lets the host pick its default.
    pub trace_template: Option<PathBuf>,
}

/// Operations the lifecycle controller needs from the host OS.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Short identifier used in log messages.
    fn name(&self) -> &str;

    /// Paths on the system whose file name is `file_name`, in the order the
    /// search tool reports them.
    async fn search(&self, file_name: &str) -> Result<Vec<PathBuf>>;

    /// Clear persisted simulator state.
    async fn reset_simulator(&self) -> Result<()>;

    /// Build `project` for `device`, blocking until the build tool exits.
    ///
    /// Returns whether the tool exited successfully. `Err` means the tool
    /// could not be run at all.
    async fn build(&self, project: &Path, build_args: &[String], device: DeviceFamily) -> Result<bool>;

    async fn launch_host(&self, launch: &HostLaunch) -> Result<Box<dyn HostHandle>>;

    /// Quit the simulator application.
    async fn dismiss_simulator(&self) -> Result<()>;
}

// Compile-time assertion that Toolchain is object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Toolchain) {}
};

// ---------------------------------------------------------------------------
// XcodeToolchain
// ---------------------------------------------------------------------------

/// Spotlight, xcodebuild, Instruments and AppleScript.
#[derive(Debug, Clone)]
pub struct XcodeToolchain {
    pub search_binary: String,
    pub build_binary: String,
    pub host_binary: String,
    pub script_binary: String,
    /// Simulator state directory whose subdirectories are wiped on reset.
    pub simulator_state_dir: Option<PathBuf>,
    pub simulator_app_name: String,
}

impl Default for XcodeToolchain {
    fn default() -> Self {
        Self {
            search_binary: "mdfind".to_owned(),
            build_binary: "xcodebuild".to_owned(),
            host_binary: "instruments".to_owned(),
            script_binary: "osascript".to_owned(),
            simulator_state_dir: dirs::home_dir()
                .map(|home| home.join("Library/Application Support/iPhone Simulator")),
            simulator_app_name: "iPhone Simulator".to_owned(),
        }
    }
}

impl XcodeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arguments for the automation host, in the order Instruments expects.
    pub fn host_args(launch: &HostLaunch) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(template) = &launch.trace_template {
            args.push("-t".to_owned());
            args.push(template.display().to_string());
        }
        args.push(launch.artifact.display().to_string());
        args.extend([
            "-e".to_owned(),
            "UIASCRIPT".to_owned(),
            launch.bootstrap.display().to_string(),
            "-e".to_owned(),
            "UIARESULTSPATH".to_owned(),
            launch.results_dir.display().to_string(),
        ]);
        args
    }

    /// Build-tool arguments: the configured ones, then the device family.
    pub fn build_tool_args(build_args: &[String], device: DeviceFamily) -> Vec<String> {
        let mut args = build_args.to_vec();
        args.push(format!(
            "TARGETED_DEVICE_FAMILY={}",
            device.targeted_device_family()
        ));
        args
    }
}

#[async_trait]
impl Toolchain for XcodeToolchain {
    fn name(&self) -> &str {
        "xcode"
    }

    async fn search(&self, file_name: &str) -> Result<Vec<PathBuf>> {
        let output = Command::new(&self.search_binary)
            .arg("-name")
            .arg(file_name)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.search_binary))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.search_binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(parse_search_output(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn reset_simulator(&self) -> Result<()> {
        let Some(dir) = &self.simulator_state_dir else {
            debug!("no simulator state directory configured");
            return Ok(());
        };

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", dir.display()));
            }
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                let path = entry.path();
                tokio::fs::remove_dir_all(&path)
                    .await
                    .with_context(|| format!("failed to remove {}", path.display()))?;
                debug!(path = %path.display(), "removed simulator state");
            }
        }
        Ok(())
    }

    async fn build(&self, project: &Path, build_args: &[String], device: DeviceFamily) -> Result<bool> {
        let project_dir = match project.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let args = Self::build_tool_args(build_args, device);
        info!(
            project_dir = %project_dir.display(),
            args = %args.join(" "),
            "building app"
        );

        let status = Command::new(&self.build_binary)
            .args(&args)
            .current_dir(project_dir)
            .stdin(Stdio::null())
            .status()
            .await
            .with_context(|| format!("failed to run {}", self.build_binary))?;

        Ok(status.success())
    }

    async fn launch_host(&self, launch: &HostLaunch) -> Result<Box<dyn HostHandle>> {
        let args = Self::host_args(launch);
        debug!(binary = %self.host_binary, args = %args.join(" "), "spawning automation host");

        let child = Command::new(&self.host_binary)
            .args(&args)
            .stdin(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.host_binary))?;

        Ok(Box::new(ChildHost::new(child)))
    }

    async fn dismiss_simulator(&self) -> Result<()> {
        let script = format!("tell application \"{}\" to quit", self.simulator_app_name);
        let status = Command::new(&self.script_binary)
            .arg("-e")
            .arg(&script)
            .stdin(Stdio::null())
            .status()
            .await
            .with_context(|| format!("failed to run {}", self.script_binary))?;

        if !status.success() {
            bail!("{} exited with {status}", self.script_binary);
        }
        Ok(())
    }
}

/// One path per non-empty line.
pub fn parse_search_output(stdout: &str) -> Vec<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect()
}
