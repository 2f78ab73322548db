use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        let mut cut = max_len;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push('…');
    }
    s
}

/// Asks a third-party service for a representative image of an external link.
///
/// `Ok(None)` means the service answered but had no image.
#[async_trait]
pub trait PreviewResolver: Send + Sync {
    async fn resolve(&self, link: &str) -> Result<Option<String>>;
}

/// Link-preview service response. Only `image` is consumed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewResponse {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl PreviewResponse {
    /// The image URL, if present and non-blank.
    pub fn image_url(self) -> Option<String> {
        self.image.filter(|s| !s.trim().is_empty())
    }
}

/// LinkPreview provider
/// Public API (base): https://api.linkpreview.net/
///
/// Endpoint:
/// - GET /?key={api_key}&q={url-encoded link}
#[derive(Debug, Clone)]
pub struct LinkPreviewProvider {
    base_url: String,
    api_key: String,
    http: Client,
}

impl LinkPreviewProvider {
    /// `host` may be a bare host (`api.linkpreview.net`, https assumed) or a
    /// full origin.
    pub fn new(host: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let host = host.trim().trim_end_matches('/');
        let base_url = if host.contains("://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        let http = Client::builder()
            .user_agent("ProductGallery/1.0")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url,
            api_key: api_key.to_string(),
            http,
        })
    }

    pub fn request_url(&self, link: &str) -> String {
        format!(
            "{}/?key={}&q={}",
            self.base_url,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(link)
        )
    }
}

#[async_trait]
impl PreviewResolver for LinkPreviewProvider {
    async fn resolve(&self, link: &str) -> Result<Option<String>> {
        let url = self.request_url(link);
        let resp = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 500);
            return Err(anyhow!(
                "link preview failed: {status} link={link} body={body}"
            ));
        }

        let body: PreviewResponse = resp.json().await?;
        Ok(body.image_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_url_encodes_link() {
        let provider =
            LinkPreviewProvider::new("api.linkpreview.net", "k3y", Duration::from_secs(5)).unwrap();
        assert_eq!(
            provider.request_url("https://shop.example.com/p?id=1&x=y"),
            "https://api.linkpreview.net/?key=k3y&q=https%3A%2F%2Fshop.example.com%2Fp%3Fid%3D1%26x%3Dy"
        );
    }

    #[test]
    fn explicit_scheme_is_kept() {
        let provider =
            LinkPreviewProvider::new("http://127.0.0.1:9000/", "k", Duration::from_secs(5)).unwrap();
        assert!(provider.request_url("a").starts_with("http://127.0.0.1:9000/?key=k"));
    }

    #[test]
    fn response_without_usable_image_yields_none() {
        let r: PreviewResponse = serde_json::from_str(r#"{"title":"t"}"#).unwrap();
        assert_eq!(r.image_url(), None);
        let r: PreviewResponse = serde_json::from_str(r#"{"image":"  "}"#).unwrap();
        assert_eq!(r.image_url(), None);
        let r: PreviewResponse =
            serde_json::from_str(r#"{"image":"http://img/a.png","url":"http://x"}"#).unwrap();
        assert_eq!(r.image_url().as_deref(), Some("http://img/a.png"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = truncate_for_log("ééééé".to_string(), 3);
        assert_eq!(s, "é…");
    }
}
