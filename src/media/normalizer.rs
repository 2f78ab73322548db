//! Square-crop normalization of preview images.
//!
//! The normalizer is total: any fetch, decode or encode failure resolves to
//! the input URL unchanged.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Fetches raw image bytes for a URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    http: Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent("ProductGallery/1.0")
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("image fetch failed: {status} url={url}"));
        }
        Ok(resp.bytes().await?)
    }
}

/// Centred square region of a `width x height` image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquareCrop {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

impl SquareCrop {
    /// `None` for images with zero area.
    pub fn centered(width: u32, height: u32) -> Option<Self> {
        let size = width.min(height);
        if size == 0 {
            return None;
        }
        Some(Self {
            x: (width - size) / 2,
            y: (height - size) / 2,
            size,
        })
    }
}

/// Decodes `bytes`, crops the centred square and re-encodes it as JPEG.
///
/// Decoded buffers are owned by this frame and released on every return path.
pub fn crop_to_square_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes).context("failed to decode image")?;
    let crop = SquareCrop::centered(decoded.width(), decoded.height())
        .ok_or_else(|| anyhow!("image has zero area"))?;
    let square = decoded
        .crop_imm(crop.x, crop.y, crop.size, crop.size)
        .to_rgb8();
    drop(decoded);

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&square)
        .context("failed to encode jpeg")?;
    Ok(out)
}

pub fn to_data_url(mime: &str, data: &[u8]) -> String {
    format!(
        "data:{mime};base64,{}",
        base64::engine::general_purpose::STANDARD.encode(data)
    )
}

#[derive(Clone)]
pub struct ImageNormalizer {
    fetcher: Arc<dyn ImageFetcher>,
    quality: u8,
}

impl ImageNormalizer {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, quality: u8) -> Self {
        Self {
            fetcher,
            quality: quality.clamp(1, 100),
        }
    }

    /// Square-cropped JPEG data URL for `url`, or `url` itself on any failure.
    pub async fn normalize(&self, url: &str) -> String {
        match self.try_normalize(url).await {
            Ok(data_url) => data_url,
            Err(e) => {
                debug!(url, error = %e, "square crop failed; using original image url");
                url.to_string()
            }
        }
    }

    async fn try_normalize(&self, url: &str) -> Result<String> {
        let bytes = self.fetcher.fetch(url).await?;
        let quality = self.quality;
        let jpeg = tokio::task::spawn_blocking(move || crop_to_square_jpeg(&bytes, quality))
            .await
            .context("image crop task aborted")??;
        Ok(to_data_url("image/jpeg", &jpeg))
    }
}
