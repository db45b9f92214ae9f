// CodeQual Infrastructure - In-Memory Adapter
// Implements: JobStore (single-process, not durable across restarts)

mod job_store;

pub use job_store::InMemoryJobStore;
