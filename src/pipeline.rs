//! Resolution pipeline: one independent task per placeholder record.
//!
//! Each task asks the preview resolver for an image, square-crops it and
//! writes the result into its own slot. Failures are per-item and silent;
//! the record keeps its placeholder.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::media::ImageNormalizer;
use crate::preview::PreviewResolver;
use crate::store::{Lease, ProductStore, Slot, UpdateOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionJob {
    pub slot: Slot,
    pub link: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Resolved,
    /// Service answered without an image.
    NoImage,
    Failed,
    /// Store torn down (or slot gone) before the result could land.
    Stale,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionSummary {
    pub attempted: usize,
    pub resolved: usize,
    pub no_image: usize,
    pub failed: usize,
    pub stale: usize,
}

impl ResolutionSummary {
    fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Resolved => self.resolved += 1,
            TaskOutcome::NoImage => self.no_image += 1,
            TaskOutcome::Failed => self.failed += 1,
            TaskOutcome::Stale => self.stale += 1,
        }
    }
}

#[derive(Clone)]
pub struct ResolutionPipeline {
    resolver: Arc<dyn PreviewResolver>,
    normalizer: ImageNormalizer,
    max_concurrency: Option<usize>,
}

impl ResolutionPipeline {
    pub fn new(resolver: Arc<dyn PreviewResolver>, normalizer: ImageNormalizer) -> Self {
        Self {
            resolver,
            normalizer,
            max_concurrency: None,
        }
    }

    /// Caps in-flight resolutions. Unbounded unless set.
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit.filter(|n| *n > 0);
        self
    }

    /// Launches every job at once and waits until all have settled.
    ///
    /// Dropping the returned future aborts the in-flight tasks.
    pub async fn run(
        &self,
        store: &ProductStore,
        lease: Lease,
        jobs: Vec<ResolutionJob>,
    ) -> ResolutionSummary {
        let mut summary = ResolutionSummary {
            attempted: jobs.len(),
            ..Default::default()
        };
        if jobs.is_empty() {
            return summary;
        }

        let limiter = self.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));
        let mut tasks = JoinSet::new();
        for job in jobs {
            let resolver = self.resolver.clone();
            let normalizer = self.normalizer.clone();
            let store = store.clone();
            let limiter = limiter.clone();
            tasks.spawn(async move {
                let _permit = match limiter {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };
                resolve_one(&job, resolver.as_ref(), &normalizer, &store, lease).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    warn!(error = %e, "resolution task did not complete");
                    summary.record(TaskOutcome::Failed);
                }
            }
        }

        info!(
            attempted = summary.attempted,
            resolved = summary.resolved,
            no_image = summary.no_image,
            failed = summary.failed,
            stale = summary.stale,
            "preview resolution settled"
        );
        summary
    }
}

async fn resolve_one(
    job: &ResolutionJob,
    resolver: &dyn PreviewResolver,
    normalizer: &ImageNormalizer,
    store: &ProductStore,
    lease: Lease,
) -> TaskOutcome {
    if !store.is_current(lease) {
        return TaskOutcome::Stale;
    }

    let image_url = match resolver.resolve(&job.link).await {
        Ok(Some(url)) => url,
        Ok(None) => {
            debug!(product_id = %job.slot.id, link = %job.link, "no preview image; keeping placeholder");
            return TaskOutcome::NoImage;
        }
        Err(e) => {
            debug!(product_id = %job.slot.id, link = %job.link, error = %e, "preview lookup failed; keeping placeholder");
            return TaskOutcome::Failed;
        }
    };

    let photo = normalizer.normalize(&image_url).await;
    if photo.trim().is_empty() {
        return TaskOutcome::NoImage;
    }

    match store.update_photo(lease, &job.slot, photo) {
        UpdateOutcome::Applied => {
            debug!(product_id = %job.slot.id, index = job.slot.index, "preview photo applied");
            TaskOutcome::Resolved
        }
        UpdateOutcome::Stale => TaskOutcome::Stale,
        other => {
            warn!(product_id = %job.slot.id, index = job.slot.index, outcome = ?other, "preview photo not applied");
            TaskOutcome::Stale
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::models::{PhotoSource, ProductId, ProductView};
    use crate::media::ImageFetcher;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use bytes::Bytes;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const PH: &str = "PLACEHOLDER";

    #[derive(Clone)]
    enum Reply {
        Image(&'static str, u64),
        Nothing,
        Error,
    }

    #[derive(Default)]
    struct ScriptedResolver {
        replies: HashMap<String, Reply>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedResolver {
        fn with(mut self, link: &str, reply: Reply) -> Self {
            self.replies.insert(link.to_string(), reply);
            self
        }
    }

    #[async_trait]
    impl PreviewResolver for ScriptedResolver {
        async fn resolve(&self, link: &str) -> Result<Option<String>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let reply = self.replies.get(link).cloned().unwrap_or(Reply::Nothing);
            let out = match reply {
                Reply::Image(url, delay_ms) => {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    Ok(Some(url.to_string()))
                }
                Reply::Nothing => Ok(None),
                Reply::Error => Err(anyhow!("network error")),
            };
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            out
        }
    }

    struct PngFetcher;

    #[async_trait]
    impl ImageFetcher for PngFetcher {
        async fn fetch(&self, url: &str) -> Result<Bytes> {
            if url.contains("broken") {
                return Ok(Bytes::from_static(b"not an image"));
            }
            let img = RgbImage::from_pixel(30, 12, Rgb([10, 200, 10]));
            let mut buf = Vec::new();
            DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
            Ok(Bytes::from(buf))
        }
    }

    fn view(id: i64, link: &str, placeholder: bool) -> ProductView {
        ProductView {
            id: ProductId::from(id),
            title: format!("item {id}"),
            link: link.to_string(),
            photo: if placeholder { PH.into() } else { format!("http://cdn/{id}.jpg") },
            created_at: None,
            photo_source: if placeholder {
                PhotoSource::Placeholder
            } else {
                PhotoSource::Backend
            },
        }
    }

    fn jobs_for(views: &[ProductView]) -> Vec<ResolutionJob> {
        views
            .iter()
            .enumerate()
            .filter(|(_, v)| v.photo == PH)
            .map(|(index, v)| ResolutionJob {
                slot: Slot {
                    index,
                    id: v.id.clone(),
                },
                link: v.link.clone(),
            })
            .collect()
    }

    fn pipeline(resolver: Arc<ScriptedResolver>) -> ResolutionPipeline {
        ResolutionPipeline::new(resolver, ImageNormalizer::new(Arc::new(PngFetcher), 90))
    }

    fn seeded(views: Vec<ProductView>) -> (ProductStore, Lease, Vec<ResolutionJob>) {
        let store = ProductStore::new();
        let lease = store.lease();
        let jobs = jobs_for(&views);
        store.seed(lease, views);
        (store, lease, jobs)
    }

    #[tokio::test]
    async fn resolved_photo_lands_in_its_own_slot() {
        let (store, lease, jobs) =
            seeded(vec![view(1, "http://x", true), view(2, "http://y", false)]);
        let resolver = Arc::new(ScriptedResolver::default().with("http://x", Reply::Image("http://img/a.png", 0)));

        let summary = pipeline(resolver).run(&store, lease, jobs).await;

        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.resolved, 1);
        let snap = store.snapshot();
        assert!(snap[0].photo.starts_with("data:image/jpeg;base64,"));
        assert_eq!(snap[0].photo_source, PhotoSource::Preview);
        assert_eq!(snap[1].photo, "http://cdn/2.jpg");
    }

    #[tokio::test]
    async fn failures_are_isolated_per_record() {
        let (store, lease, jobs) = seeded(vec![
            view(1, "http://err", true),
            view(2, "http://ok", true),
            view(3, "http://none", true),
        ]);
        let resolver = Arc::new(
            ScriptedResolver::default()
                .with("http://err", Reply::Error)
                .with("http://ok", Reply::Image("http://img/ok.png", 0))
                .with("http://none", Reply::Nothing),
        );

        let summary = pipeline(resolver).run(&store, lease, jobs).await;

        assert_eq!(
            summary,
            ResolutionSummary {
                attempted: 3,
                resolved: 1,
                no_image: 1,
                failed: 1,
                stale: 0
            }
        );
        let snap = store.snapshot();
        assert_eq!(snap[0].photo, PH);
        assert!(snap[1].photo.starts_with("data:image/jpeg"));
        assert_eq!(snap[2].photo, PH);
    }

    #[tokio::test]
    async fn out_of_order_completion_keeps_every_write() {
        let (store, lease, jobs) = seeded(vec![
            view(1, "http://slow", true),
            view(2, "http://fast", true),
            view(3, "http://mid", true),
        ]);
        let resolver = Arc::new(
            ScriptedResolver::default()
                .with("http://slow", Reply::Image("http://img/slow.png", 40))
                .with("http://fast", Reply::Image("http://img/fast.png", 0))
                .with("http://mid", Reply::Image("http://img/mid.png", 15)),
        );

        let summary = pipeline(resolver).run(&store, lease, jobs).await;

        assert_eq!(summary.resolved, 3);
        assert!(store
            .snapshot()
            .iter()
            .all(|p| p.photo_source == PhotoSource::Preview));
    }

    #[tokio::test]
    async fn undecodable_preview_keeps_original_url() {
        let (store, lease, jobs) = seeded(vec![view(1, "http://x", true)]);
        let resolver = Arc::new(
            ScriptedResolver::default().with("http://x", Reply::Image("http://img/broken.png", 0)),
        );

        pipeline(resolver).run(&store, lease, jobs).await;

        assert_eq!(store.snapshot()[0].photo, "http://img/broken.png");
    }

    #[tokio::test]
    async fn results_after_close_are_dropped() {
        let (store, lease, jobs) = seeded(vec![view(1, "http://x", true)]);
        let resolver = Arc::new(
            ScriptedResolver::default().with("http://x", Reply::Image("http://img/a.png", 30)),
        );
        let closer = {
            let store = store.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                store.close();
            })
        };

        let summary = pipeline(resolver).run(&store, lease, jobs).await;
        closer.await.unwrap();

        assert_eq!(summary.stale, 1);
        assert_eq!(store.snapshot()[0].photo, PH);
    }

    #[tokio::test]
    async fn concurrency_cap_limits_in_flight_lookups() {
        let views: Vec<ProductView> = (1..=6).map(|i| view(i, "http://same", true)).collect();
        let (store, lease, jobs) = seeded(views);
        let resolver = Arc::new(
            ScriptedResolver::default().with("http://same", Reply::Image("http://img/a.png", 10)),
        );

        let summary = pipeline(resolver.clone())
            .with_max_concurrency(Some(2))
            .run(&store, lease, jobs)
            .await;

        assert_eq!(summary.resolved, 6);
        assert!(resolver.peak.load(Ordering::SeqCst) <= 2);
    }
}
