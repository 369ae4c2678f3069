//! Wires the store, collaborators and orchestrator together from a
//! [`Config`].

use std::sync::Arc;
use std::time::Duration;

use crate::api::StatusApi;
use crate::config::Config;
use crate::error::Result;
use crate::extract::PdfTextExtractor;
use crate::http::create_http_client;
use crate::orchestrator::{Collaborators, Orchestrator, RecoveryReport};
use crate::secrets::SecretSource;
use crate::source::{HttpDocumentSource, UploadStore};
use crate::store::{JobStore, SqliteJobStore};
use crate::summarize::{DryRunSummarizer, OpenAiSummarizer, Summarizer};
use crate::translate::SummaryTranslator;

/// Everything the HTTP surface needs.
#[derive(Clone)]
pub struct Service {
    pub orchestrator: Orchestrator,
    pub status: StatusApi,
    pub uploads: UploadStore,
    pub translator: SummaryTranslator,
}

impl Service {
    /// Opens the SQLite store at `config.database_path` and builds the service.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = SqliteJobStore::open(&config.database_path)?;
        log::info!("Job store opened at {}", config.database_path.display());
        Self::with_store(config, Arc::new(store))
    }

    pub fn with_store(config: &Config, store: Arc<dyn JobStore>) -> Result<Self> {
        let settings = config.pipeline.settings();
        let uploads = UploadStore::new(&config.upload_dir, config.server.max_upload_bytes);

        let fetch_client = create_http_client(settings.timeouts.resolve)?;
        let source = HttpDocumentSource::new(fetch_client, uploads.clone())
            .with_doi_resolver(config.source.doi_resolver_url.clone());

        let summarizer = build_summarizer(config, settings.timeouts.summarize)?;
        let status = StatusApi::new(Arc::clone(&store));
        let translator = SummaryTranslator::new(
            status.clone(),
            Arc::clone(&summarizer),
            settings.timeouts.summarize,
        );

        let collaborators = Collaborators {
            source: Arc::new(source),
            extractor: Arc::new(PdfTextExtractor::new()),
            summarizer,
        };

        let orchestrator = Orchestrator::new(store, collaborators, settings);
        Ok(Self {
            orchestrator,
            status,
            uploads,
            translator,
        })
    }

    /// See [`Orchestrator::recover`].
    pub async fn recover(&self) -> Result<RecoveryReport> {
        Ok(self.orchestrator.recover().await?)
    }
}

fn build_summarizer(config: &Config, timeout: Duration) -> Result<Arc<dyn Summarizer>> {
    let summarizer = &config.summarizer;
    if summarizer.dry_run {
        log::warn!("Dry-run mode: summaries are mock output");
        return Ok(Arc::new(DryRunSummarizer));
    }

    let api_key = SecretSource::from(summarizer).resolve()?;
    let client = create_http_client(timeout)?;
    log::info!(
        "Summarizer: model {} at {}",
        summarizer.model,
        crate::sanitize::redact_url(&summarizer.base_url)
    );
    Ok(Arc::new(OpenAiSummarizer::new(
        client,
        api_key,
        &summarizer.base_url,
        &summarizer.model,
    )))
}
