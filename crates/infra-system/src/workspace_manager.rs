// Temp-directory workspace manager
// reason: tempfile for collision-free, race-free directory creation
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use codequal_core::application::constants::WORKSPACE_PREFIX;
use codequal_core::port::{Workspace, WorkspaceError, WorkspaceManager};

/// Creates one `codequal-<job_id>-XXXXXX` directory per job under a root
pub struct TempWorkspaceManager {
    root: PathBuf,
}

impl TempWorkspaceManager {
    /// Use `root` for workspaces, creating it if missing
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, WorkspaceError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            WorkspaceError::InvalidRoot(format!("{}: {}", root.display(), e))
        })?;
        if !root.is_dir() {
            return Err(WorkspaceError::InvalidRoot(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove workspace directories left behind by a previous process.
    ///
    /// Returns how many were removed. Only call while no pipeline runs.
    pub fn sweep_orphans(&self) -> std::io::Result<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let is_workspace = name.to_string_lossy().starts_with(WORKSPACE_PREFIX);
            if !is_workspace || !entry.file_type()?.is_dir() {
                continue;
            }
            match std::fs::remove_dir_all(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %entry.path().display(), error = %e, "Failed to remove orphan workspace"),
            }
        }
        if removed > 0 {
            info!(removed, root = %self.root.display(), "Removed orphan workspaces");
        }
        Ok(removed)
    }
}

/// Keep directory names predictable: ids are UUIDs, anything else is masked
fn name_fragment(job_id: &str) -> String {
    job_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[async_trait]
impl WorkspaceManager for TempWorkspaceManager {
    async fn acquire(&self, job_id: &str) -> Result<Workspace, WorkspaceError> {
        let root = self.root.clone();
        let prefix = format!("{}{}-", WORKSPACE_PREFIX, name_fragment(job_id));

        let created = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(&prefix)
                .rand_bytes(6)
                .tempdir_in(&root)
                .map(|dir| dir.keep())
        })
        .await;

        match created {
            Ok(Ok(path)) => Ok(Workspace::new(path)),
            Ok(Err(e)) => Err(WorkspaceError::CreateFailed {
                root: self.root.display().to_string(),
                reason: e.to_string(),
            }),
            Err(e) => Err(WorkspaceError::CreateFailed {
                root: self.root.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn release(&self, mut workspace: Workspace) {
        let path = workspace.root().to_path_buf();
        let released = tokio::task::spawn_blocking(move || workspace.release()).await;
        match released {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(path = %path.display(), error = %e, "Failed to remove workspace"),
            Err(e) => warn!(path = %path.display(), error = %e, "Workspace removal task failed"),
        }
    }
}
