//! Storage seam for command and response files.
//!
//! [`CommandChannel`](super::CommandChannel) only talks to a
//! [`CommandStore`], so tests can swap the workspace directory for an
//! in-memory double and drive the protocol without touching disk.

use std::io::ErrorKind;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::workspace::Workspace;

/// Where numbered commands go and numbered responses come from.
#[async_trait]
pub trait CommandStore: Send + Sync {
    /// Persist the script text for command `index`.
    async fn write_command(&self, index: i64, text: &str) -> Result<()>;

    /// Fetch the raw response document for command `index`.
    ///
    /// Returns `Ok(None)` while the response does not exist yet.
    async fn read_response(&self, index: i64) -> Result<Option<String>>;
}

// Compile-time assertion: CommandStore must be usable as `dyn CommandStore`.
const _: () = {
    fn _assert_object_safe(_: &dyn CommandStore) {}
};

/// The real store: files inside a session [`Workspace`].
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    workspace: Workspace,
}

impl WorkspaceStore {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }
}

#[async_trait]
impl CommandStore for WorkspaceStore {
    /// Written to a sibling temp file and renamed into place, so the host
    /// never reads a partial command.
    async fn write_command(&self, index: i64, text: &str) -> Result<()> {
        let path = self.workspace.command_path(index);
        let staging = path.with_extension("txt.tmp");
        tokio::fs::write(&staging, text)
            .await
            .with_context(|| format!("failed to write command file {}", path.display()))?;
        tokio::fs::rename(&staging, &path)
            .await
            .with_context(|| format!("failed to publish command file {}", path.display()))
    }

    async fn read_response(&self, index: i64) -> Result<Option<String>> {
        let path = self.workspace.response_path(index);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e)
                .with_context(|| format!("failed to read response file {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_command_verbatim() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).unwrap();
        let store = WorkspaceStore::new(ws.clone());

        store.write_command(3, "target.delay(1);\n").await.unwrap();
        let written = std::fs::read_to_string(ws.command_path(3)).unwrap();
        assert_eq!(written, "target.delay(1);\n");
        assert!(!ws.path().join("3-cmd.txt.tmp").exists());
    }

    #[tokio::test]
    async fn missing_response_is_none() {
        let root = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::new(Workspace::create(root.path()).unwrap());
        assert!(store.read_response(0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn existing_response_is_returned() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).unwrap();
        std::fs::write(ws.response_path(0), r#"{"responses":[]}"#).unwrap();

        let store = WorkspaceStore::new(ws);
        assert_eq!(
            store.read_response(0).await.unwrap().as_deref(),
            Some(r#"{"responses":[]}"#)
        );
    }

    #[tokio::test]
    async fn write_into_missing_directory_fails() {
        let store = WorkspaceStore::new(Workspace::open("/nonexistent/tapline-ws"));
        let err = store.write_command(0, "x").await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to write command file"));
    }
}
