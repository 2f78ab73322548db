use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::catalog::{BackendClient, CatalogLoader, CatalogSource, LoadOutcome};
use crate::config::GalleryConfig;
use crate::media::{HttpImageFetcher, ImageFetcher, ImageNormalizer};
use crate::pipeline::{ResolutionPipeline, ResolutionSummary};
use crate::preview::{LinkPreviewProvider, PreviewResolver};
use crate::store::ProductStore;

/// External collaborators of a session.
#[derive(Clone)]
pub struct GalleryServices {
    pub catalog: Arc<dyn CatalogSource>,
    pub resolver: Arc<dyn PreviewResolver>,
    pub fetcher: Arc<dyn ImageFetcher>,
}

impl GalleryServices {
    /// HTTP-backed services for the configured backend and preview host.
    pub fn from_config(config: &GalleryConfig) -> Result<Self> {
        Ok(Self {
            catalog: Arc::new(BackendClient::new(&config.base_origin, config.http_timeout)?),
            resolver: Arc::new(LinkPreviewProvider::new(
                &config.preview_host,
                &config.preview_api_key,
                config.http_timeout,
            )?),
            fetcher: Arc::new(HttpImageFetcher::new(config.http_timeout)?),
        })
    }
}

/// How a session ended up once its background work finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionReport {
    /// Listing could not be fetched; the store was never seeded.
    LoadFailed(String),
    /// Torn down before the listing arrived.
    Stale,
    Settled {
        products: usize,
        resolution: ResolutionSummary,
    },
}

/// Handle for one mounted view session. Dropping it unmounts.
pub struct GalleryHandle {
    store: ProductStore,
    task: Option<JoinHandle<SessionReport>>,
}

impl GalleryHandle {
    pub fn store(&self) -> &ProductStore {
        &self.store
    }

    /// Waits until the load and every resolution attempt have settled.
    /// Returns `None` if the session was unmounted or already awaited.
    pub async fn settled(&mut self) -> Option<SessionReport> {
        let task = self.task.as_mut()?;
        let report = task.await.ok();
        self.task = None;
        report
    }

    /// Tears the session down: pending writes are rejected and in-flight
    /// work is aborted. Idempotent.
    pub fn unmount(&mut self) {
        self.store.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for GalleryHandle {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Mounts a session: seeds a fresh store from the catalog in the background
/// and fans out preview resolution for every placeholder record.
pub fn mount(config: &GalleryConfig, services: GalleryServices) -> GalleryHandle {
    let loader = CatalogLoader::new(services.catalog, &config.base_origin, &config.placeholder_url);
    let pipeline = ResolutionPipeline::new(
        services.resolver,
        ImageNormalizer::new(services.fetcher, config.jpeg_quality),
    )
    .with_max_concurrency(config.max_concurrency);

    let store = ProductStore::new();
    let lease = store.lease();
    let task = {
        let store = store.clone();
        tokio::spawn(async move {
            let (products, jobs) = match loader.load(&store, lease).await {
                Ok(LoadOutcome::Seeded { products, jobs }) => (products, jobs),
                Ok(LoadOutcome::Stale) => return SessionReport::Stale,
                Err(e) => {
                    warn!(error = %e, "catalog load failed; store left unseeded");
                    return SessionReport::LoadFailed(e.to_string());
                }
            };
            let resolution = pipeline.run(&store, lease, jobs).await;
            info!(products, resolved = resolution.resolved, "gallery session settled");
            SessionReport::Settled {
                products,
                resolution,
            }
        })
    };

    GalleryHandle {
        store,
        task: Some(task),
    }
}
