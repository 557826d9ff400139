//! Wires the pipeline components around one shared store and registry.

use std::sync::Arc;

use super::classifier::RecordClassifier;
use super::confirmation::ConfirmationEngine;
use super::correction::CorrectionEngine;
use super::dispatcher::SubmissionDispatcher;
use super::export::ResultsExporter;
use super::progress::ProgressTracker;
use super::store::SubmissionStore;
use crate::config::PipelineSettings;
use crate::registry::RegistryClient;

#[derive(Clone)]
pub struct SubmissionPipeline {
    pub store: Arc<SubmissionStore>,
    pub dispatcher: SubmissionDispatcher,
    pub progress: ProgressTracker,
    pub confirmation: ConfirmationEngine,
    pub correction: CorrectionEngine,
    pub exporter: ResultsExporter,
}

impl SubmissionPipeline {
    pub fn new(registry: Arc<dyn RegistryClient>, settings: &PipelineSettings) -> Self {
        let store = Arc::new(SubmissionStore::new());
        let classifier = Arc::new(RecordClassifier::new(&settings.confirmable_error_codes));
        Self {
            dispatcher: SubmissionDispatcher::new(store.clone(), registry.clone(), classifier.clone(), settings),
            progress: ProgressTracker::new(store.clone()),
            confirmation: ConfirmationEngine::new(store.clone(), registry.clone(), classifier.clone(), settings.retry),
            correction: CorrectionEngine::new(store.clone(), registry, classifier, settings),
            exporter: ResultsExporter::new(store.clone()),
            store,
        }
    }
}
