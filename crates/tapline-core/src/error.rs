//! Error types for the automation library.
//!
//! Protocol-level failures (timeouts, write failures) are not errors: they
//! come back as [`crate::protocol::CommandResult`] values with a negative
//! status. The types here cover failures that abort a session or a typed
//! client call.

use std::path::PathBuf;

use thiserror::Error;

/// A response document could not be turned into command results.
#[derive(Debug, Error)]
pub enum ResponseParseError {
    /// The document is not valid JSON or does not have the expected shape.
    #[error("malformed response document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Fatal failures while bringing a session up.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The workspace directory or one of its staged assets could not be written.
    #[error("failed to prepare workspace at {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Neither the configuration nor a filesystem search produced a project.
    #[error("could not find the Xcode project {name}: {detail}")]
    ProjectNotFound { name: String, detail: String },

    /// The compiled app bundle never showed up.
    #[error("could not find the compiled app {name} after {attempts} attempts{detail}")]
    ArtifactNotFound {
        name: String,
        attempts: u32,
        detail: String,
    },

    /// The build tool could not be run at all.
    #[error("failed to run the build tool: {0}")]
    Build(String),

    /// The automation host process could not be started.
    #[error("failed to launch the automation host: {0}")]
    HostLaunch(String),
}

/// Failures surfaced by typed client calls.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// The host could not evaluate a composite expression; carries the
    /// host's raw output text.
    #[error("automation host could not evaluate the command: {output}")]
    HostEvaluation { output: String },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
