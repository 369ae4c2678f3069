//! Shared handler state.

use layscience::{Orchestrator, Service, StatusApi, SummaryTranslator};
use layscience::source::UploadStore;

/// Cloned into every request; all fields are cheap handles.
#[derive(Clone)]
pub struct AppState {
    pub service: Service,
}

impl AppState {
    pub fn new(service: Service) -> Self {
        Self { service }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.service.orchestrator
    }

    pub fn status(&self) -> &StatusApi {
        &self.service.status
    }

    pub fn uploads(&self) -> &UploadStore {
        &self.service.uploads
    }

    pub fn translator(&self) -> &SummaryTranslator {
        &self.service.translator
    }
}
