//! Per-execution workspaces
//!
//! Every execution gets its own directory under a shared root, named by a random
//! UUID. The directory and everything in it belongs to that execution alone and is
//! removed when the execution finishes. Anything left behind by a crash is picked
//! up later by the [`Sweeper`].

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

pub use crate::workspace::sweeper::{SweepReport, Sweeper, SweeperHandle};

mod sweeper;

/// Errors that occur while preparing a workspace
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create workspace at {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Creates workspaces under a common root
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory shared by all workspaces
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh workspace directory
    ///
    /// The root is created if needed; the workspace directory itself is created
    /// exclusively so an id collision fails instead of sharing a directory.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub async fn create(&self) -> Result<Workspace, WorkspaceError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| WorkspaceError::Create {
                path: self.root.clone(),
                source,
            })?;

        let id = Uuid::new_v4();
        let path = self.root.join(id.to_string());
        tokio::fs::create_dir(&path)
            .await
            .map_err(|source| WorkspaceError::Create {
                path: path.clone(),
                source,
            })?;

        debug!(%id, path = %path.display(), "workspace created");

        Ok(Workspace {
            id,
            path,
            files: Vec::new(),
            destroyed: false,
        })
    }
}

/// An isolated directory owned by one execution
///
/// # Cleanup
///
/// Call [`destroy()`](Self::destroy) when the execution is done. If the workspace is
/// dropped without it (a panic or a cancelled future), `Drop` removes the directory
/// synchronously and logs a warning.
#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    path: PathBuf,
    files: Vec<PathBuf>,
    destroyed: bool,
}

impl Workspace {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Path to the workspace directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Files written through [`write_file`](Self::write_file)
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Host path of a file inside the workspace
    ///
    /// Only plain relative names are accepted; absolute paths and `..` are rejected.
    pub fn file_path(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        let relative = Path::new(name);
        let is_plain = !name.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(WorkspaceError::InvalidPath(format!(
                "path traversal not allowed: {name}"
            )));
        }
        Ok(self.path.join(relative))
    }

    /// Write a file into the workspace
    #[instrument(skip(self, content), fields(workspace = %self.id))]
    pub async fn write_file(
        &mut self,
        name: &str,
        content: &[u8],
    ) -> Result<PathBuf, WorkspaceError> {
        let path = self.file_path(name)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| WorkspaceError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|source| WorkspaceError::Write {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), len = content.len(), "wrote file to workspace");
        self.files.push(path.clone());
        Ok(path)
    }

    /// Remove the workspace directory and everything in it
    ///
    /// Idempotent. Failures are logged and never returned: a request that already
    /// produced a result must not fail because of cleanup.
    #[instrument(skip(self), fields(workspace = %self.id))]
    pub async fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        match remove_tree(&self.path).await {
            Ok(true) => debug!("workspace removed"),
            Ok(false) => debug!("workspace already gone"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove workspace"),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.destroyed {
            return;
        }

        warn!(
            workspace = %self.id,
            path = %self.path.display(),
            "Workspace dropped without explicit destroy, removing synchronously"
        );

        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(workspace = %self.id, error = %e, "best-effort workspace removal failed")
            }
        }
    }
}

/// Recursively remove `path`, treating a missing directory as success
///
/// Returns `Ok(false)` when nothing was there to remove.
pub(crate) async fn remove_tree(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
