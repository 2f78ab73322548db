use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::models::{parse_created_at, ProductRecord, ProductView};
use super::photo::{needs_resolution, normalize_photo};
use crate::pipeline::ResolutionJob;
use crate::store::{Lease, ProductStore, SeedOutcome, Slot};

/// Source of the authoritative product list.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_products(&self) -> Result<Vec<ProductRecord>>;
}

/// Backend product-listing client.
///
/// Endpoint:
/// - GET {base_origin}/api/products -> [ProductRecord]
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    http: Client,
}

impl BackendClient {
    pub fn new(base_origin: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent("ProductGallery/1.0")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_origin.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn products_url(&self) -> String {
        format!("{}/api/products", self.base_url)
    }
}

#[async_trait]
impl CatalogSource for BackendClient {
    async fn fetch_products(&self) -> Result<Vec<ProductRecord>> {
        let url = self.products_url();
        let resp = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("product listing failed: {status} url={url}"));
        }
        resp.json::<Vec<ProductRecord>>()
            .await
            .with_context(|| format!("malformed product listing from {url}"))
    }
}

#[derive(Debug)]
pub enum LoadOutcome {
    /// Store seeded; `jobs` are the records still showing the placeholder.
    Seeded {
        products: usize,
        jobs: Vec<ResolutionJob>,
    },
    /// The consumer went away before the listing arrived; nothing was written.
    Stale,
}

#[derive(Clone)]
pub struct CatalogLoader {
    source: Arc<dyn CatalogSource>,
    base_origin: String,
    placeholder: String,
}

impl CatalogLoader {
    pub fn new(source: Arc<dyn CatalogSource>, base_origin: &str, placeholder: &str) -> Self {
        Self {
            source,
            base_origin: base_origin.to_string(),
            placeholder: placeholder.to_string(),
        }
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Normalizes photos and orders by `created_at`, newest first. The sort is
    /// stable; records without a parseable timestamp go last.
    pub fn build_views(&self, records: Vec<ProductRecord>) -> Vec<ProductView> {
        let mut keyed: Vec<(Option<DateTime<Utc>>, ProductView)> = records
            .into_iter()
            .map(|record| {
                let (photo, photo_source) =
                    normalize_photo(record.photo.as_deref(), &self.base_origin, &self.placeholder);
                let created = record.created_at.as_deref().and_then(parse_created_at);
                let view = ProductView {
                    id: record.id,
                    title: record.title,
                    link: record.link,
                    photo,
                    created_at: record.created_at,
                    photo_source,
                };
                (created, view)
            })
            .collect();

        keyed.sort_by(|(a, _), (b, _)| newest_first(a.as_ref(), b.as_ref()));
        keyed.into_iter().map(|(_, view)| view).collect()
    }

    /// One resolution job per placeholder record, addressed by its seeded slot.
    pub fn resolution_jobs(&self, views: &[ProductView]) -> Vec<ResolutionJob> {
        views
            .iter()
            .enumerate()
            .filter(|(_, view)| needs_resolution(view, &self.placeholder))
            .map(|(index, view)| ResolutionJob {
                slot: Slot {
                    index,
                    id: view.id.clone(),
                },
                link: view.link.clone(),
            })
            .collect()
    }

    /// Fetches the listing and seeds `store` in one step under `lease`.
    ///
    /// A fetch error leaves the store untouched.
    pub async fn load(&self, store: &ProductStore, lease: Lease) -> Result<LoadOutcome> {
        let records = self.source.fetch_products().await?;
        debug!(records = records.len(), "product listing received");

        let views = self.build_views(records);
        let jobs = self.resolution_jobs(&views);
        match store.seed(lease, views) {
            SeedOutcome::Seeded(products) => {
                info!(products, candidates = jobs.len(), "product store seeded");
                Ok(LoadOutcome::Seeded { products, jobs })
            }
            SeedOutcome::Stale => {
                debug!("consumer gone before listing arrived; discarding");
                Ok(LoadOutcome::Stale)
            }
        }
    }
}

fn newest_first(a: Option<&DateTime<Utc>>, b: Option<&DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
