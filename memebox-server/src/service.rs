//! Catalog service: composition root for list and search requests

use memebox_common::config::EnrichmentConfig;
use memebox_common::{Catalog, MemeRecord, Result};
use std::sync::Arc;

use crate::collaborators::DescriptionGenerator;
use crate::enrichment::EnrichmentCoordinator;
use crate::search;
use crate::store::CatalogStore;

pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
    coordinator: EnrichmentCoordinator,
}

impl CatalogService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        generator: Arc<dyn DescriptionGenerator>,
        config: EnrichmentConfig,
    ) -> Self {
        let coordinator = EnrichmentCoordinator::new(Arc::clone(&store), generator, config);
        Self { store, coordinator }
    }

    pub fn generator_available(&self) -> bool {
        self.coordinator.generator_available()
    }

    /// Full catalog with missing descriptions generated where possible
    ///
    /// Records whose generation failed are returned without a description.
    pub async fn list(&self) -> Result<Catalog> {
        let enriched = self.coordinator.refresh().await?;
        Ok(enriched.catalog)
    }

    /// Matching records from the persisted catalog, without enrichment
    ///
    /// The query is validated before the store is touched.
    pub async fn search(&self, query: Option<&str>) -> Result<Vec<MemeRecord>> {
        let query = search::validate_query(query)?;
        let catalog = self.store.load().await?;
        let results = search::search(&catalog, Some(query))?;
        Ok(results.into_iter().cloned().collect())
    }
}
