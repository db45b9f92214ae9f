// Panic isolation for pipeline tasks
use std::any::Any;
use tokio::task::JoinError;
use tracing::error;

/// Outcome of a pipeline task awaited through its join handle
#[derive(Debug)]
pub enum GuardedOutcome<T> {
    /// Task ran to completion
    Finished(T),
    /// Task panicked; carries the panic message
    Panicked(String),
    /// Task was cancelled (runtime shutting down)
    Cancelled,
}

/// Classify a join result.
///
/// The pipeline runs in its own spawned task, so a panic surfaces here as a
/// `JoinError` instead of unwinding into the caller.
pub fn classify<T>(job_id: &str, result: Result<T, JoinError>) -> GuardedOutcome<T> {
    match result {
        Ok(value) => GuardedOutcome::Finished(value),
        Err(e) if e.is_panic() => {
            let panic_msg = panic_message(e.into_panic());
            error!(job_id = %job_id, panic_msg = %panic_msg, "Pipeline task panicked");
            GuardedOutcome::Panicked(panic_msg)
        }
        Err(_) => GuardedOutcome::Cancelled,
    }
}

/// Extract a readable message from a panic payload
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_classify_panic_with_string_payload() {
        let handle = tokio::spawn(async {
            let n = 7;
            if n > 0 {
                panic!("engine crashed with code {}", n);
            }
            n
        });

        match classify("job-1", handle.await) {
            GuardedOutcome::Panicked(msg) => assert_eq!(msg, "engine crashed with code 7"),
            other => panic!("expected panic outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_classify_finished() {
        let handle = tokio::spawn(async { 42 });
        assert!(matches!(
            classify("job-1", handle.await),
            GuardedOutcome::Finished(42)
        ));
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(17_u8)), "Unknown panic");
    }
}
