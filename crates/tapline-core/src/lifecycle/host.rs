//! Owned handle to the external automation host process.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Child;
use tracing::{debug, warn};

/// A running automation host, exclusively owned by one session.
///
/// Nothing happens implicitly on drop; the lifecycle controller decides
/// when to wait, signal, or kill.
#[async_trait]
pub trait HostHandle: Send {
    /// OS process id, if the host is still known to the OS.
    fn id(&self) -> Option<u32>;

    /// True while the process has not exited.
    fn is_alive(&mut self) -> bool;

    /// Wait up to `timeout` for the process to exit on its own.
    ///
    /// Returns `true` if it exited in time.
    async fn wait_for_exit(&mut self, timeout: Duration) -> bool;

    /// Ask the process to stop (SIGTERM on Unix).
    async fn terminate(&mut self) -> Result<()>;

    /// Force the process to stop and reap it.
    async fn kill(&mut self) -> Result<()>;
}

/// [`HostHandle`] over a spawned child process.
#[derive(Debug)]
pub struct ChildHost {
    child: Child,
}

impl ChildHost {
    pub fn new(child: Child) -> Self {
        Self { child }
    }
}

#[async_trait]
impl HostHandle for ChildHost {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(?status, "automation host has exited");
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(error = %e, "error checking automation host status");
                false
            }
        }
    }

    async fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(?status, "automation host exited");
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, "error waiting for automation host");
                false
            }
            Err(_elapsed) => false,
        }
    }

    async fn terminate(&mut self) -> Result<()> {
        let Some(pid) = self.child.id() else {
            // Already reaped.
            return Ok(());
        };

        #[cfg(unix)]
        {
            // SAFETY: pid belongs to a child we spawned and have not reaped.
            let ret = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
            if ret != 0 {
                return Err(std::io::Error::last_os_error())
                    .with_context(|| format!("failed to send SIGTERM to pid {pid}"));
            }
        }

        #[cfg(not(unix))]
        {
            self.child
                .start_kill()
                .with_context(|| format!("failed to stop pid {pid}"))?;
        }

        Ok(())
    }

    async fn kill(&mut self) -> Result<()> {
        self.child
            .kill()
            .await
            .context("failed to kill automation host")
    }
}
