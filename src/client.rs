// src/client.rs
//! HTTP client for the listing endpoints, used by the desktop shell, the
//! `search` CLI and remote sources.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use metrics::counter;
use tracing::warn;
use url::Url;

use crate::cache::CacheStatus;
use crate::listing::Listing;

pub const CACHE_HEADER: &str = "x-cache";

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        Url::parse(&base_url).with_context(|| format!("invalid base url {base_url:?}"))?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("av-deals/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self { base_url, http })
    }

    /// `<base><endpoint>?query=<urlencoded>`
    pub fn endpoint_url(&self, endpoint: &str, query: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, endpoint))
            .with_context(|| format!("joining {endpoint:?} onto {}", self.base_url))?;
        url.query_pairs_mut().append_pair("query", query);
        Ok(url)
    }

    /// GET the endpoint and decode the listing array. Non-success statuses
    /// are errors; the `X-Cache` header is reported when present.
    pub async fn try_fetch(
        &self,
        endpoint: &str,
        query: &str,
    ) -> Result<(Vec<Listing>, Option<CacheStatus>)> {
        let url = self.endpoint_url(endpoint, query)?;
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("GET {url}: HTTP {status}");
        }
        let cache = resp
            .headers()
            .get(CACHE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| match v {
                "HIT" => Some(CacheStatus::Hit),
                "MISS" => Some(CacheStatus::Miss),
                _ => None,
            });
        let listings = resp
            .json::<Vec<Listing>>()
            .await
            .map_err(|e| anyhow!("decoding listings from {url}: {e}"))?;
        Ok((listings, cache))
    }

    /// Desktop bridge contract: any failure yields an empty list.
    pub async fn fetch_api(&self, endpoint: &str, query: &str) -> Vec<Listing> {
        match self.try_fetch(endpoint, query).await {
            Ok((listings, _)) => listings,
            Err(e) => {
                counter!("client_fetch_errors_total").increment(1);
                warn!(target: "client", endpoint, error = ?e, "Error fetching API");
                Vec::new()
            }
        }
    }
}
