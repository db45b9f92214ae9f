// Application Layer - Use Cases and Business Logic

pub mod constants;
pub mod gateway;
pub mod runner;
pub mod scheduler;
pub mod submission;

// Re-exports
pub use gateway::{JobCounts, JobOutcomeView, JobView, ResultsGateway};
pub use runner::AnalysisRunner;
pub use scheduler::JobScheduler;
pub use submission::SubmitRequest;
