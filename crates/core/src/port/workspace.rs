// Workspace Port - isolated per-job filesystem area

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::constants::SOURCE_DIR_NAME;

/// Workspace errors
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Failed to create workspace under {root}: {reason}")]
    CreateFailed { root: String, reason: String },

    #[error("Workspace root is not usable: {0}")]
    InvalidRoot(String),
}

/// Exclusively-owned workspace directory.
///
/// Removal is idempotent and also runs on drop, so the directory is gone
/// on every exit path of the owner, including unwinding after a panic.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    released: bool,
}

impl Workspace {
    /// Wrap an already-created, empty directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            released: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory the repository is fetched into
    pub fn source_dir(&self) -> PathBuf {
        self.root.join(SOURCE_DIR_NAME)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Remove the workspace and everything in it.
    ///
    /// A missing directory counts as released.
    pub fn release(&mut self) -> std::io::Result<()> {
        if self.released {
            return Ok(());
        }
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.released = true;
        debug!(path = %self.root.display(), "Workspace released");
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(path = %self.root.display(), error = %e, "Failed to remove workspace on drop");
        }
    }
}

/// Allocates and destroys workspaces
#[async_trait]
pub trait WorkspaceManager: Send + Sync {
    /// Create a fresh, empty workspace owned by `job_id`
    async fn acquire(&self, job_id: &str) -> Result<Workspace, WorkspaceError>;

    /// Destroy a workspace. Never fails; problems are logged.
    async fn release(&self, workspace: Workspace);
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Creates plain directories under a caller-provided root and remembers
    /// every path it handed out.
    pub struct MockWorkspaceManager {
        root: PathBuf,
        fail_acquire: AtomicBool,
        counter: AtomicUsize,
        acquired: Mutex<Vec<PathBuf>>,
    }

    impl MockWorkspaceManager {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self {
                root: root.into(),
                fail_acquire: AtomicBool::new(false),
                counter: AtomicUsize::new(0),
                acquired: Mutex::new(Vec::new()),
            }
        }

        /// Make every following `acquire` fail
        pub fn fail_acquire(&self) {
            self.fail_acquire.store(true, Ordering::SeqCst);
        }

        pub fn acquired(&self) -> Vec<PathBuf> {
            self.acquired.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WorkspaceManager for MockWorkspaceManager {
        async fn acquire(&self, job_id: &str) -> Result<Workspace, WorkspaceError> {
            if self.fail_acquire.load(Ordering::SeqCst) {
                return Err(WorkspaceError::CreateFailed {
                    root: self.root.display().to_string(),
                    reason: "No space left on device".to_string(),
                });
            }
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            let path = self.root.join(format!("{}-{}", job_id, n));
            std::fs::create_dir_all(&path).map_err(|e| WorkspaceError::CreateFailed {
                root: self.root.display().to_string(),
                reason: e.to_string(),
            })?;
            self.acquired.lock().unwrap().push(path.clone());
            Ok(Workspace::new(path))
        }

        async fn release(&self, mut workspace: Workspace) {
            if let Err(e) = workspace.release() {
                warn!(error = %e, "Mock workspace release failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("ws");
        std::fs::create_dir_all(path.join("nested")).unwrap();
        std::fs::write(path.join("nested/file.txt"), "data").unwrap();

        let mut workspace = Workspace::new(&path);
        workspace.release().unwrap();
        assert!(!path.exists());
        assert!(workspace.is_released());

        workspace.release().unwrap();
    }

    #[test]
    fn test_drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("ws");
        std::fs::create_dir_all(&path).unwrap();

        {
            let _workspace = Workspace::new(&path);
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_drop_during_panic_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("ws");
        std::fs::create_dir_all(&path).unwrap();

        let path_for_panic = path.clone();
        let result = std::panic::catch_unwind(move || {
            let _workspace = Workspace::new(path_for_panic);
            panic!("engine blew up");
        });

        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_source_dir_is_inside_root() {
        let root = tempfile::tempdir().unwrap();
        let mut workspace = Workspace::new(root.path().join("never-created"));
        assert!(workspace.source_dir().starts_with(workspace.root()));

        // Releasing a missing directory succeeds
        workspace.release().unwrap();
        assert!(workspace.is_released());
    }
}
