// CodeQual Infrastructure - System Adapters
// Implements: WorkspaceManager, RepositoryFetcher (git), AnalysisEngine (scanner)

pub mod engine;
pub mod git_fetcher;
pub mod process;
pub mod workspace_manager;

pub use engine::{EngineConfig, ScannerEngine};
pub use git_fetcher::{GitFetcher, GitFetcherConfig};
pub use process::{CommandSpec, ProcessError, ProcessOutput, ProcessRunner};
pub use workspace_manager::TempWorkspaceManager;
