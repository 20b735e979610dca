//! Lazy enrichment of catalog records
//!
//! Records without an `ai_description` are sent to the description generator,
//! concurrently and at most once per record per batch. Successful results are
//! merged back by id and the catalog is persisted. Failures and timeouts only
//! affect their own record, which stays unenriched and is retried on a later
//! batch once its backoff delay has passed.

use futures::stream::{self, StreamExt};
use memebox_common::config::EnrichmentConfig;
use memebox_common::{Catalog, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::collaborators::{CollaboratorError, DescriptionGenerator};
use crate::store::CatalogStore;

/// Counters for one enrichment batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    /// Records lacking a description when the batch started
    pub pending: usize,
    /// Pending records skipped because they are still backing off
    pub deferred: usize,
    /// Generator calls issued
    pub attempted: usize,
    pub enriched: usize,
    pub failed: usize,
    /// Whether the catalog was written back
    pub saved: bool,
}

/// Catalog plus what the batch did to it
#[derive(Debug, Clone)]
pub struct Enriched {
    pub catalog: Catalog,
    pub report: EnrichmentReport,
}

#[derive(Debug, Clone, Copy)]
struct Backoff {
    failures: u32,
    retry_at: Instant,
}

struct PendingRecord {
    id: String,
    image_url: String,
    title: String,
}

/// Brings catalog records to the enriched state and persists the result.
///
/// All load-modify-save sequences issued through the coordinator are
/// serialized by `write_lock`: a second concurrent [`refresh`](Self::refresh)
/// waits for the first, reloads the catalog it wrote, and finds nothing left
/// to generate. This does not cover writers that call
/// [`CatalogStore::save`] directly; such a writer racing a batch is resolved
/// by whichever save lands last.
pub struct EnrichmentCoordinator {
    store: Arc<dyn CatalogStore>,
    generator: Arc<dyn DescriptionGenerator>,
    config: EnrichmentConfig,
    write_lock: Mutex<()>,
    backoff: std::sync::Mutex<HashMap<String, Backoff>>,
}

impl EnrichmentCoordinator {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        generator: Arc<dyn DescriptionGenerator>,
        config: EnrichmentConfig,
    ) -> Self {
        Self {
            store,
            generator,
            config,
            write_lock: Mutex::new(()),
            backoff: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Whether listing can currently fill in missing descriptions
    pub fn generator_available(&self) -> bool {
        self.generator.is_available()
    }

    /// Load the persisted catalog and enrich it under the write lock
    pub async fn refresh(&self) -> Result<Enriched> {
        let _guard = self.write_lock.lock().await;
        let catalog = self.store.load().await?;
        self.run_batch(catalog).await
    }

    /// Enrich a catalog the caller already loaded
    ///
    /// Returns the catalog unchanged, without writing, when no record needs a
    /// description.
    pub async fn enrich(&self, catalog: Catalog) -> Result<Enriched> {
        let _guard = self.write_lock.lock().await;
        self.run_batch(catalog).await
    }

    async fn run_batch(&self, mut catalog: Catalog) -> Result<Enriched> {
        let mut report = EnrichmentReport::default();

        let pending: Vec<PendingRecord> = catalog
            .memes
            .iter()
            .filter(|m| m.needs_description(self.config.regenerate_blank))
            .map(|m| PendingRecord {
                id: m.id.clone(),
                image_url: m.image_url.clone(),
                title: m.title.clone(),
            })
            .collect();
        report.pending = pending.len();

        if pending.is_empty() {
            self.backoff
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clear();
            return Ok(Enriched { catalog, report });
        }

        if !self.generator.is_available() {
            warn!(
                generator = self.generator.name(),
                pending = report.pending,
                "Description generator unavailable, serving catalog unenriched"
            );
            return Ok(Enriched { catalog, report });
        }

        let (due, deferred) = self.split_by_backoff(pending);
        report.deferred = deferred;
        if due.is_empty() {
            debug!(deferred, "All pending records are backing off");
            return Ok(Enriched { catalog, report });
        }

        info!(
            count = due.len(),
            deferred,
            "Generating descriptions for memes"
        );
        report.attempted = due.len();

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let generator = &self.generator;
        let outcomes: Vec<(String, std::result::Result<String, CollaboratorError>)> =
            stream::iter(due)
                .map(|record| async move {
                    let outcome = match tokio::time::timeout(
                        timeout,
                        generator.generate(&record.image_url, &record.title),
                    )
                    .await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => Err(CollaboratorError::GenerationFailed(format!(
                            "timed out after {:?}",
                            timeout
                        ))),
                    };
                    (record.id, outcome)
                })
                .buffer_unordered(self.config.max_concurrency.max(1))
                .collect()
                .await;

        for (id, outcome) in outcomes {
            match outcome {
                Ok(text) => {
                    if let Some(meme) = catalog.get_mut(&id) {
                        meme.ai_description = Some(text);
                        report.enriched += 1;
                    }
                    self.clear_backoff(&id);
                }
                Err(e) => {
                    let delay = self.record_failure(&id);
                    warn!(
                        id = %id,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Description generation failed, record left unenriched"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.enriched > 0 {
            self.store.save(&catalog).await?;
            report.saved = true;
        }

        info!(
            enriched = report.enriched,
            failed = report.failed,
            deferred = report.deferred,
            "Meme description update complete"
        );
        Ok(Enriched { catalog, report })
    }

    /// Split pending records into those due now and a count of those deferred
    ///
    /// Backoff entries for ids that are no longer pending are dropped.
    fn split_by_backoff(&self, pending: Vec<PendingRecord>) -> (Vec<PendingRecord>, usize) {
        let mut backoff = self.backoff.lock().unwrap_or_else(|e| e.into_inner());
        let pending_ids: HashSet<&str> = pending.iter().map(|r| r.id.as_str()).collect();
        backoff.retain(|id, _| pending_ids.contains(id.as_str()));

        let now = Instant::now();
        let (due, deferred): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|r| backoff.get(&r.id).map_or(true, |b| b.retry_at <= now));
        (due, deferred.len())
    }

    fn record_failure(&self, id: &str) -> Duration {
        let mut backoff = self.backoff.lock().unwrap_or_else(|e| e.into_inner());
        let failures = backoff.get(id).map_or(0, |b| b.failures) + 1;
        let delay = backoff_delay(&self.config, failures);
        backoff.insert(
            id.to_string(),
            Backoff {
                failures,
                retry_at: Instant::now() + delay,
            },
        );
        delay
    }

    fn clear_backoff(&self, id: &str) {
        self.backoff
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
    }
}

/// `retry_base_ms * 2^(failures - 1)`, capped at `retry_max_ms`
fn backoff_delay(config: &EnrichmentConfig, failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(32);
    let ms = config
        .retry_base_ms
        .saturating_mul(1u64 << exponent)
        .min(config.retry_max_ms);
    Duration::from_millis(ms)
}
