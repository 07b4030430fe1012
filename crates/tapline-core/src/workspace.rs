//! Per-session workspace directory.
//!
//! The workspace is the only channel between the controller and the
//! automation host. It holds:
//!
//! - `{n}-cmd.txt`: script text for command `n`, written by the controller.
//! - `{n}-resp.txt`: response document for command `n`, written by the host.
//! - `bootstrap.js`: the UIAutomation run loop, with `$PATH_ROOT` replaced
//!   by the workspace path.
//! - `writeResponse.py`: helper the bootstrap uses to publish responses.
//! - `Automation.tracetemplate`: optional Instruments template.

use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use crate::error::LifecycleError;

/// Template for the host-side run loop.
pub const BOOTSTRAP_TEMPLATE: &str = include_str!("../assets/bootstrap.js");
/// Response writer invoked by the bootstrap for every command.
pub const RESPONSE_WRITER: &str = include_str!("../assets/writeResponse.py");
/// Token in [`BOOTSTRAP_TEMPLATE`] replaced with the workspace path.
pub const PATH_ROOT_TOKEN: &str = "$PATH_ROOT";

pub const BOOTSTRAP_FILE_NAME: &str = "bootstrap.js";
pub const RESPONSE_WRITER_FILE_NAME: &str = "writeResponse.py";
pub const TRACE_TEMPLATE_FILE_NAME: &str = "Automation.tracetemplate";

/// An ephemeral directory owned by exactly one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    path: PathBuf,
}

/// Paths of the assets staged into a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAssets {
    pub bootstrap: PathBuf,
    pub response_writer: PathBuf,
    pub trace_template: Option<PathBuf>,
}

impl Workspace {
    /// Create a fresh, uniquely named directory under `root`.
    pub fn create(root: &Path) -> Result<Self, LifecycleError> {
        let path = root.join(format!("tapline-{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&path).map_err(|source| LifecycleError::Workspace {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "created workspace");
        Ok(Self { path })
    }

    /// Wrap an existing directory without creating anything.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn command_path(&self, index: i64) -> PathBuf {
        self.path.join(command_file_name(index))
    }

    pub fn response_path(&self, index: i64) -> PathBuf {
        self.path.join(response_file_name(index))
    }

    pub fn bootstrap_path(&self) -> PathBuf {
        self.path.join(BOOTSTRAP_FILE_NAME)
    }

    /// The bootstrap script with the path-root token substituted.
    ///
    /// The root always ends with a separator so the script can append file
    /// names directly.
    pub fn render_bootstrap(&self) -> String {
        let root = format!("{}/", self.path.display());
        BOOTSTRAP_TEMPLATE.replace(PATH_ROOT_TOKEN, &root)
    }

    /// Write the bootstrap and response writer, and copy the trace template.
    pub fn stage_assets(&self, trace_template: Option<&Path>) -> Result<StagedAssets, LifecycleError> {
        let bootstrap = self.bootstrap_path();
        write_asset(&bootstrap, &self.render_bootstrap())?;

        let response_writer = self.path.join(RESPONSE_WRITER_FILE_NAME);
        write_asset(&response_writer, RESPONSE_WRITER)?;

        let trace_template = match trace_template {
            Some(source) => {
                let dest = self.path.join(TRACE_TEMPLATE_FILE_NAME);
                std::fs::copy(source, &dest).map_err(|source| LifecycleError::Workspace {
                    path: dest.clone(),
                    source,
                })?;
                Some(dest)
            }
            None => None,
        };

        Ok(StagedAssets {
            bootstrap,
            response_writer,
            trace_template,
        })
    }

    /// Delete the directory and everything in it.
    pub fn remove(&self) -> std::io::Result<()> {
        std::fs::remove_dir_all(&self.path)
    }
}

pub fn command_file_name(index: i64) -> String {
    format!("{index}-cmd.txt")
}

pub fn response_file_name(index: i64) -> String {
    format!("{index}-resp.txt")
}

fn write_asset(path: &Path, contents: &str) -> Result<(), LifecycleError> {
    std::fs::write(path, contents).map_err(|source| LifecycleError::Workspace {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_makes_unique_directories() {
        let root = tempfile::tempdir().unwrap();
        let a = Workspace::create(root.path()).unwrap();
        let b = Workspace::create(root.path()).unwrap();
        assert!(a.path().is_dir());
        assert!(b.path().is_dir());
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn file_names_follow_index() {
        let ws = Workspace::open("/tmp/ws");
        assert_eq!(ws.command_path(0), PathBuf::from("/tmp/ws/0-cmd.txt"));
        assert_eq!(ws.response_path(12), PathBuf::from("/tmp/ws/12-resp.txt"));
    }

    #[test]
    fn bootstrap_has_path_root_substituted() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).unwrap();
        let assets = ws.stage_assets(None).unwrap();

        let bootstrap = std::fs::read_to_string(&assets.bootstrap).unwrap();
        assert!(!bootstrap.contains(PATH_ROOT_TOKEN));
        assert!(bootstrap.contains(&format!("{}/", ws.path().display())));

        let writer = std::fs::read_to_string(&assets.response_writer).unwrap();
        assert_eq!(writer, RESPONSE_WRITER);
        assert!(assets.trace_template.is_none());
    }

    #[test]
    fn stage_assets_copies_trace_template() {
        let root = tempfile::tempdir().unwrap();
        let template = root.path().join("custom.tracetemplate");
        std::fs::write(&template, "template-bytes").unwrap();

        let ws = Workspace::create(root.path()).unwrap();
        let assets = ws.stage_assets(Some(&template)).unwrap();

        let copied = assets.trace_template.expect("template should be staged");
        assert_eq!(copied, ws.path().join(TRACE_TEMPLATE_FILE_NAME));
        assert_eq!(std::fs::read_to_string(copied).unwrap(), "template-bytes");
    }

    #[test]
    fn missing_trace_template_is_a_workspace_error() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).unwrap();
        let err = ws
            .stage_assets(Some(Path::new("/nonexistent/Automation.tracetemplate")))
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Workspace { .. }));
    }

    #[test]
    fn remove_deletes_directory() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).unwrap();
        std::fs::write(ws.command_path(0), "x").unwrap();
        ws.remove().unwrap();
        assert!(!ws.path().exists());
    }
}
