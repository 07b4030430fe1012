//! Shared test doubles for tapline integration tests.
//!
//! - [`MemoryStore`]: a [`CommandStore`](tapline_core::protocol::CommandStore)
//!   that never touches disk and answers through a scripted responder.
//! - [`SumAppHost`]: an in-process automation host that plays the sample
//!   sum app against a real workspace directory.
//! - [`FakeToolchain`]: a scripted [`Toolchain`](tapline_core::lifecycle::Toolchain)
//!   that records every call and launches a [`SumAppHost`] instead of
//!   Instruments.

mod fake_host;
mod fake_toolchain;
mod memory_store;

pub use fake_host::{HostBehavior, SumAppHost, SumAppState};
pub use fake_toolchain::{FakeToolchain, LaunchMode, ToolchainCall};
pub use memory_store::{MemoryStore, document, echo_line, per_line};
