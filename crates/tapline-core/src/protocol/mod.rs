//! The file-based command/response protocol.
//!
//! # Architecture
//!
//! ```text
//! CommandChannel::dispatch(text)
//!     |
//!     +-- batching? --> pending queue, synthetic success
//!     |
//!     +-- index += 1
//!     |   CommandStore::write_command(index, text)      {index}-cmd.txt
//!     |   loop until deadline:
//!     |       CommandStore::read_response(index)        {index}-resp.txt
//!     |       response::parse_response(raw)
//!     |
//!     v
//! Vec<CommandResult>
//! ```
//!
//! [`batch::run_batch`] folds several producers into one dispatch and
//! splits the results back apart by sentinel.

pub mod batch;
pub mod channel;
pub mod response;
pub mod store;

pub use batch::{Batch, BatchBuckets, Producer, producer, run_batch};
pub use channel::{ChannelState, CommandChannel};
pub use response::parse_response;
pub use store::{CommandStore, WorkspaceStore};

use serde::{Deserialize, Serialize};

/// Outcome of one evaluated statement.
///
/// `status` is 0 on success. Negative values are produced locally
/// (timeouts, write failures); anything the host reports is passed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub status: i32,
    #[serde(default)]
    pub output: String,
}

impl CommandResult {
    pub const BATCHED_MESSAGE: &'static str = "command batched successfully";
    pub const NO_RESPONSE_MESSAGE: &'static str = "Did Not Get Response.";
    pub const NO_SESSION_MESSAGE: &'static str = "no active automation session";

    pub fn new(status: i32, output: impl Into<String>) -> Self {
        Self {
            status,
            output: output.into(),
        }
    }

    pub fn success(output: impl Into<String>) -> Self {
        Self::new(0, output)
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self::new(-1, output)
    }

    /// The placeholder returned for a command queued while batching.
    pub fn batched() -> Self {
        Self::success(Self::BATCHED_MESSAGE)
    }

    /// The single result returned when the host never answered.
    pub fn no_response() -> Self {
        Self::failure(Self::NO_RESPONSE_MESSAGE)
    }

    pub fn was_successful(&self) -> bool {
        self.status == 0
    }

    /// True when the output text reads as a host-side `true`.
    pub fn is_true(&self) -> bool {
        self.output.to_lowercase().starts_with("true")
    }
}
