//! Transport to the stats API.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

use statsboard_core::breakdown::FetchResult;
use statsboard_core::config::Config;
use statsboard_core::query::{Query, Site};

use crate::error::FetchError;

/// GET with query parameters, returning parsed JSON.
///
/// The HTTP implementation talks to a live server; tests substitute scripted
/// fakes so the fetch cycle can be driven deterministically.
#[async_trait]
pub trait StatsApi: Send + Sync + 'static {
    async fn get(
        &self,
        path: &str,
        query: &Query,
        extra_params: &[(&str, String)],
    ) -> Result<Value, FetchError>;
}

/// `/api/stats/<encoded domain><endpoint>`.
pub fn api_path(site: &Site, endpoint: &str) -> String {
    let domain: String = url::form_urlencoded::byte_serialize(site.domain.as_bytes()).collect();
    format!("/api/stats/{domain}{endpoint}")
}

/// Decode a breakdown payload. Extra top-level fields are ignored.
pub fn decode(payload: Value) -> Result<FetchResult, FetchError> {
    Ok(serde_json::from_value(payload)?)
}

pub struct HttpStatsApi {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpStatsApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let mut base_url = Url::parse(base_url)?;
        // Without the slash, joining would replace the last path segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Self::new(&config.api_url, config.request_timeout())
    }

    /// `path` resolved below the base URL, keeping any path prefix the base
    /// carries.
    fn endpoint_url(&self, path: &str) -> Result<Url, FetchError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }
}

#[async_trait]
impl StatsApi for HttpStatsApi {
    async fn get(
        &self,
        path: &str,
        query: &Query,
        extra_params: &[(&str, String)],
    ) -> Result<Value, FetchError> {
        let mut url = self.endpoint_url(path)?;
        {
            let mut qs = url.query_pairs_mut();
            for (key, value) in query.api_params() {
                qs.append_pair(key, &value);
            }
            for (key, value) in extra_params {
                qs.append_pair(key, value);
            }
        }

        debug!(%url, "GET stats");
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json().await?)
    }
}
