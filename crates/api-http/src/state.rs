// Shared handler state

use std::sync::Arc;

use codequal_core::application::{JobScheduler, ResultsGateway};
use codequal_core::port::SessionVerifier;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<JobScheduler>,
    pub gateway: Arc<ResultsGateway>,
    pub verifier: Arc<dyn SessionVerifier>,
}

impl AppState {
    pub fn new(
        scheduler: Arc<JobScheduler>,
        gateway: Arc<ResultsGateway>,
        verifier: Arc<dyn SessionVerifier>,
    ) -> Self {
        Self {
            scheduler,
            gateway,
            verifier,
        }
    }
}
