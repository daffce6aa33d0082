use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::CONTENT_TYPE;
use url::Url;

/// A response as stored in and served from the asset cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
  pub url: String,
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

impl Asset {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Network access for the asset cache.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
  /// Fetch `url` live. Non-2xx responses are returned, not turned into errors.
  async fn fetch(&self, url: &Url) -> Result<Asset>;
}

/// Fetcher backed by reqwest
#[derive(Clone)]
pub struct HttpFetcher {
  http: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self> {
    let http = reqwest::Client::builder()
      .user_agent(concat!("casewatch/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;
    Ok(Self { http })
  }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
  async fn fetch(&self, url: &Url) -> Result<Asset> {
    let response = self
      .http
      .get(url.clone())
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", url, e))?;

    let status = response.status().as_u16();
    let content_type = response
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(String::from);
    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body of {}: {}", url, e))?;

    Ok(Asset {
      url: url.to_string(),
      status,
      content_type,
      body: body.to_vec(),
    })
  }
}
