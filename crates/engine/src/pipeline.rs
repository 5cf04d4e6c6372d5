use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use intake_api::{GraphClient, GraphError, ListSummary};
use intake_types::{Dataset, ResourceHandle, ResourceKey};
use intake_util::{SchemaNormalizer, TemporalEnricher};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::DatasetCache;
use crate::config::{ConfigError, IntakeConfig};

/// Failures of a pipeline invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The caller stopped waiting; the in-flight request was not aborted.
    #[error("dataset assembly did not finish within {}s", .after.as_secs_f64())]
    TimedOut { after: Duration },
}

type Location = (String, String, String);

/// Token → resolve → fetch → normalize → enrich, memoized through a
/// [`DatasetCache`].
///
/// Stages run strictly in sequence. Any failure aborts the whole assembly;
/// there is no partial dataset. A list with no items yields an empty dataset.
#[derive(Debug)]
pub struct SurveyPipeline {
    client: GraphClient,
    source: ResourceKey,
    normalizer: SchemaNormalizer,
    enricher: TemporalEnricher,
    cache: Arc<DatasetCache>,
    ttl: Duration,
    handles: Mutex<HashMap<Location, ResourceHandle>>,
}

impl SurveyPipeline {
    pub fn new(
        client: GraphClient,
        source: ResourceKey,
        normalizer: SchemaNormalizer,
        cache: Arc<DatasetCache>,
        ttl: Duration,
    ) -> Self {
        Self {
            client,
            source,
            normalizer,
            enricher: TemporalEnricher::default(),
            cache,
            ttl,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Wires a pipeline from loaded configuration over the default transport.
    pub fn from_config(config: &IntakeConfig, cache: Arc<DatasetCache>) -> Result<Self, PipelineError> {
        let client = GraphClient::new(config.graph_settings(), config.credentials()?)?;
        Ok(Self::new(
            client,
            config.resource_key(),
            config.normalizer(),
            cache,
            config.cache_ttl(),
        ))
    }

    pub fn with_enricher(mut self, enricher: TemporalEnricher) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn source(&self) -> &ResourceKey {
        &self.source
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    /// Returns the cached dataset, assembling a new one when the entry is
    /// missing or older than the TTL.
    pub async fn load(&self) -> Result<Dataset, PipelineError> {
        self.cache.get_or_fetch(&self.source, self.ttl, || self.assemble()).await
    }

    /// Discards the cached dataset and its resource handle, then assembles a
    /// new one.
    pub async fn refresh(&self) -> Result<Dataset, PipelineError> {
        self.cache.invalidate(&self.source).await;
        self.forget_handle();
        self.load().await
    }

    /// Like [`load`](Self::load), but stops waiting after `timeout`.
    /// Nothing is cached from an abandoned run.
    pub async fn load_within(&self, timeout: Duration) -> Result<Dataset, PipelineError> {
        tokio::time::timeout(timeout, self.load()).await.map_err(|_| {
            warn!(resource = %self.source, timeout_ms = timeout.as_millis(), "dataset assembly abandoned");
            PipelineError::TimedOut { after: timeout }
        })?
    }

    /// Display names of every list in the configured site.
    pub async fn available_lists(&self) -> Result<Vec<String>, PipelineError> {
        let (hostname, site_path, _) = self.source.location();
        let site_id = self.client.resolve_site(hostname, site_path).await?;
        let lists = self.client.list_lists(&site_id).await?;
        Ok(lists.iter().map(ListSummary::label).map(str::to_string).collect())
    }

    fn location(&self) -> Location {
        let (hostname, site_path, list_name) = self.source.location();
        (hostname.to_string(), site_path.to_string(), list_name.to_string())
    }

    fn forget_handle(&self) {
        let removed = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.location());
        if let Some(handle) = removed {
            debug!(handle = %handle, "resource handle discarded");
        }
    }

    /// The handle for the configured location. It is reused until a refresh
    /// or until the list behind it answers 404.
    pub async fn resolve_handle(&self) -> Result<ResourceHandle, PipelineError> {
        let location = self.location();
        if let Some(handle) = self.handles.lock().unwrap_or_else(PoisonError::into_inner).get(&location) {
            debug!(handle = %handle, "resource handle reused");
            return Ok(handle.clone());
        }

        let handle = self.client.resolve(&self.source).await?;
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location, handle.clone());
        Ok(handle)
    }

    async fn assemble(&self) -> Result<Dataset, PipelineError> {
        let start = Instant::now();
        let handle = self.resolve_handle().await?;
        let records = match self
            .client
            .fetch_all(&handle, self.source.projected_fields.as_ref())
            .await
        {
            Ok(records) => records,
            Err(error) => {
                if error.status() == Some(404) {
                    warn!(handle = %handle, "list no longer answers; handle will be resolved again");
                    self.forget_handle();
                }
                return Err(error.into());
            }
        };
        if records.is_empty() {
            warn!(resource = %self.source, "list has no items; returning an empty dataset");
        }

        let rows = self.enricher.enrich(self.normalizer.normalize(records));
        let dataset = Dataset::new(rows).with_source(handle);
        info!(
            resource = %self.source,
            rows = dataset.len(),
            duration_ms = start.elapsed().as_millis(),
            "dataset assembled"
        );
        Ok(dataset)
    }
}
