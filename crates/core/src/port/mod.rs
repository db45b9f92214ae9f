// Port Layer - Interfaces for external dependencies

pub mod analysis_engine;
pub mod id_provider; // For deterministic testing
pub mod job_store;
pub mod repository_fetcher;
pub mod session_verifier;
pub mod time_provider;
pub mod workspace;

// Re-exports
pub use analysis_engine::{AnalysisEngine, EngineContext, EngineError, EngineOutput};
pub use id_provider::IdProvider;
pub use job_store::{JobMutation, JobStore};
pub use repository_fetcher::{FetchError, FetchedRevision, RepositoryFetcher};
pub use session_verifier::{AuthError, SessionVerifier};
pub use time_provider::TimeProvider;
pub use workspace::{Workspace, WorkspaceError, WorkspaceManager};
