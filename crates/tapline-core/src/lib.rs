//! Core library for driving UIAutomation sessions.
//!
//! A session pairs an Instruments host process with a [`workspace::Workspace`]
//! directory. Commands are written as numbered script files and the host
//! answers with numbered response documents; [`protocol::CommandChannel`]
//! implements that exchange and [`client::AutomationClient`] puts a typed API
//! on top of it.
//!
//! ```text
//! AutomationClient
//!     |  hook::script::tap(&hook) -> "mainWindow.buttons()[0].tap();"
//!     v
//! CommandChannel --write--> {n}-cmd.txt ----> Instruments (bootstrap.js)
//!     ^                                            |
//!     +--poll/parse-- {n}-resp.txt <---------------+
//!
//! LifecycleController: workspace, build, artifact lookup, host launch/stop
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod hook;
pub mod lifecycle;
pub mod protocol;
pub mod report;
pub mod scenario;
pub mod workspace;

pub use client::AutomationClient;
pub use config::{ChannelConfig, DeviceFamily, SessionConfig};
pub use error::{AutomationError, LifecycleError};
pub use hook::Hook;
pub use lifecycle::{LifecycleController, SessionState};
pub use protocol::{BatchBuckets, CommandChannel, CommandResult};
