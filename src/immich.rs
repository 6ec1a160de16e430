//! Immich API client.
//!
//! Only two endpoints are consumed:
//! - `GET /api/assets/random?count=N` returns a JSON array of assets.
//! - `GET /api/assets/{id}/original` returns the original file bytes.
//!
//! Both are authenticated with a static `x-api-key` header.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::config::Configuration;
use crate::error::{Error, Result};

pub const API_KEY_HEADER: &str = "x-api-key";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A media item as returned by the random-asset endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    #[serde(default)]
    pub original_file_name: String,
    /// `IMAGE`, `VIDEO`, ...
    #[serde(rename = "type", default)]
    pub asset_type: String,
    #[serde(default)]
    pub file_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Where random assets and their bytes come from.
pub trait AssetSource {
    fn random_assets(&self, count: usize) -> impl Future<Output = Result<Vec<Asset>>> + Send;

    fn download_original(&self, asset_id: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

#[derive(Debug, Clone)]
pub struct ImmichClient {
    client: Client,
    base_url: Url,
}

impl ImmichClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url.trim()).map_err(|err| Error::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;

        let mut key = HeaderValue::from_str(api_key.trim()).map_err(|_| Error::InvalidApiKey)?;
        key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, key);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .user_agent(concat!("inky-frame/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Client)?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(cfg: &Configuration) -> Result<Self> {
        Self::new(&cfg.base_url, &cfg.api_key, cfg.request_timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn random_url(&self, count: usize) -> Url {
        let mut url = self.endpoint(&["api", "assets", "random"]);
        url.query_pairs_mut()
            .append_pair("count", &count.to_string());
        url
    }

    fn original_url(&self, asset_id: &str) -> Url {
        self.endpoint(&["api", "assets", asset_id, "original"])
    }

    async fn get_bytes(&self, url: Url) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| Error::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.bytes().await.map_err(|source| Error::Http {
            url: url.to_string(),
            source,
        })?;
        Ok(body.to_vec())
    }
}

impl AssetSource for ImmichClient {
    async fn random_assets(&self, count: usize) -> Result<Vec<Asset>> {
        let url = self.random_url(count);
        debug!(%url, count, "requesting random assets");
        let body = self.get_bytes(url.clone()).await?;
        // A literal `null` body is treated the same as an empty list.
        let assets: Option<Vec<Asset>> =
            serde_json::from_slice(&body).map_err(|source| Error::Decode {
                url: url.to_string(),
                source,
            })?;
        let assets = assets.unwrap_or_default();
        debug!(returned = assets.len(), "random assets received");
        Ok(assets)
    }

    async fn download_original(&self, asset_id: &str) -> Result<Vec<u8>> {
        if asset_id.trim().is_empty() {
            return Err(Error::EmptyAssetId);
        }
        let url = self.original_url(asset_id);
        debug!(%url, "downloading original");
        self.get_bytes(url).await
    }
}
