//! Runtime configuration for a gallery session, resolved from the environment.

use anyhow::{Context, Result};
use std::time::Duration;
use url::Url;

use crate::util::env::{env_opt, env_parse, env_parse_opt, env_req};

pub const DEFAULT_LOCAL_ORIGIN: &str = "http://localhost:8000";
pub const DEFAULT_DEPLOYED_ORIGIN: &str = "http://192.168.0.103:8000";
pub const DEFAULT_PLACEHOLDER_URL: &str = "https://via.placeholder.com/400x200?text=No+Image";
pub const DEFAULT_PREVIEW_HOST: &str = "api.linkpreview.net";
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8090";
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

#[derive(Debug, Clone)]
pub struct GalleryConfig {
    /// Backend origin; relative photo paths are joined onto it.
    pub base_origin: String,
    pub placeholder_url: String,
    pub preview_host: String,
    pub preview_api_key: String,
    pub http_timeout: Duration,
    /// `None` keeps the fan-out unbounded.
    pub max_concurrency: Option<usize>,
    pub jpeg_quality: u8,
    pub http_addr: String,
}

impl GalleryConfig {
    /// Build the configuration from `GALLERY_*`, `LINK_PREVIEW_*` and friends.
    ///
    /// `LINK_PREVIEW_API_KEY` is the only required variable.
    pub fn from_env() -> Result<Self> {
        let base_origin = match env_opt("GALLERY_BACKEND_URL") {
            Some(explicit) => explicit,
            None => {
                let hostname = env_opt("GALLERY_HOSTNAME").unwrap_or_else(|| "localhost".into());
                let local = env_opt("GALLERY_LOCAL_ORIGIN")
                    .unwrap_or_else(|| DEFAULT_LOCAL_ORIGIN.into());
                let deployed = env_opt("GALLERY_DEPLOYED_ORIGIN")
                    .unwrap_or_else(|| DEFAULT_DEPLOYED_ORIGIN.into());
                select_origin(&hostname, &local, &deployed).to_string()
            }
        };

        let config = Self {
            base_origin: normalize_origin(&base_origin)?,
            placeholder_url: env_opt("GALLERY_PLACEHOLDER_URL")
                .unwrap_or_else(|| DEFAULT_PLACEHOLDER_URL.into()),
            preview_host: env_opt("LINK_PREVIEW_HOST")
                .unwrap_or_else(|| DEFAULT_PREVIEW_HOST.into()),
            preview_api_key: env_req("LINK_PREVIEW_API_KEY")?,
            http_timeout: Duration::from_secs(env_parse("HTTP_TIMEOUT_SECS", 15u64)),
            max_concurrency: env_parse_opt::<usize>("RESOLVE_MAX_CONCURRENCY").filter(|n| *n > 0),
            jpeg_quality: env_parse("JPEG_QUALITY", DEFAULT_JPEG_QUALITY).clamp(1, 100),
            http_addr: env_opt("GALLERY_HTTP_ADDR").unwrap_or_else(|| DEFAULT_HTTP_ADDR.into()),
        };

        tracing::info!(
            target = "config",
            base_origin = %config.base_origin,
            preview_host = %config.preview_host,
            max_concurrency = ?config.max_concurrency,
            "gallery configuration resolved"
        );
        Ok(config)
    }

    /// Overrides the backend origin (CLI flags win over the environment).
    pub fn with_base_origin(mut self, origin: &str) -> Result<Self> {
        self.base_origin = normalize_origin(origin)?;
        Ok(self)
    }
}

/// Local sessions talk to the local backend; everything else to the deployed host.
pub fn select_origin<'a>(hostname: &str, local: &'a str, deployed: &'a str) -> &'a str {
    if hostname.trim().eq_ignore_ascii_case("localhost") {
        local
    } else {
        deployed
    }
}

/// Validates an origin and strips any trailing slash.
pub fn normalize_origin(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).with_context(|| format!("invalid backend origin {trimmed:?}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("backend origin must be http(s), got {trimmed:?}");
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localhost_selects_local_origin() {
        assert_eq!(select_origin("localhost", "L", "D"), "L");
        assert_eq!(select_origin("LocalHost ", "L", "D"), "L");
        assert_eq!(select_origin("shop.example.com", "L", "D"), "D");
    }

    #[test]
    fn origin_is_validated_and_trimmed() {
        assert_eq!(
            normalize_origin("http://localhost:8000/").unwrap(),
            "http://localhost:8000"
        );
        assert!(normalize_origin("not a url").is_err());
        assert!(normalize_origin("ftp://files.example.com").is_err());
    }
}
