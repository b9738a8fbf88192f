//! HTTP fetchers backed by reqwest.
//!
//! Metadata lives at `GET {base_url}{images_path}/{id}` and is returned as a
//! JSON object with at least `id` and `url`. Image bytes are fetched with a
//! plain `GET` of that URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::{ByteFetcher, MetadataFetcher};
use crate::types::ResourceMetadata;
use crate::{HuginnError, Result};

/// Default path of the image collection below the API base URL.
pub const DEFAULT_IMAGES_PATH: &str = "/images";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| HuginnError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Map a non-success status to [`HuginnError::Api`], using the body as message.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body
    };
    Err(HuginnError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Fetches image metadata from a JSON HTTP API.
#[derive(Clone)]
pub struct HttpMetadataFetcher {
    http: Client,
    base_url: String,
    images_path: String,
    api_token: Option<String>,
}

impl HttpMetadataFetcher {
    /// Create a fetcher for the API at `base_url` using the default images
    /// path and timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_options(base_url, DEFAULT_IMAGES_PATH, DEFAULT_TIMEOUT)
    }

    /// Create a fetcher with a custom images path and request timeout.
    pub fn with_options(
        base_url: impl Into<String>,
        images_path: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let mut images_path = images_path.into();
        if !images_path.is_empty() && !images_path.starts_with('/') {
            images_path.insert(0, '/');
        }
        Ok(Self {
            http: build_client(timeout)?,
            base_url,
            images_path: images_path.trim_end_matches('/').to_string(),
            api_token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// URL of the metadata record for `id`.
    pub fn endpoint(&self, id: &str) -> String {
        format!("{}{}/{}", self.base_url, self.images_path, id)
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, id: &str) -> Result<ResourceMetadata> {
        let mut request = self.http.get(self.endpoint(id));
        if let Some(token) = &self.api_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let response = request
            .send()
            .await
            .map_err(|e| HuginnError::Http(e.to_string()))?;
        let response = check_status(response).await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| HuginnError::Http(e.to_string()))?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Downloads image bytes over HTTP.
#[derive(Clone)]
pub struct HttpByteFetcher {
    http: Client,
}

impl HttpByteFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl ByteFetcher for HttpByteFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| HuginnError::Http(e.to_string()))?;
        let response = check_status(response).await?;

        let body = response
            .bytes()
            .await
            .map_err(|e| HuginnError::Http(e.to_string()))?;
        Ok(body.to_vec())
    }
}
