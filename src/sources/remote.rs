// src/sources/remote.rs
//! A source served over HTTP by another instance.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::{Acquired, SourceAdapter};
use crate::client::ApiClient;
use crate::config::RemoteSourceConfig;
use crate::listing::Query;

pub struct RemoteSource {
    name: String,
    endpoint: String,
    client: ApiClient,
}

impl RemoteSource {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, client: ApiClient) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn from_config(cfg: &RemoteSourceConfig, timeout: Duration) -> Result<Self> {
        let client = ApiClient::new(cfg.base_url.clone(), timeout)?;
        Ok(Self::new(cfg.name.clone(), cfg.endpoint.clone(), client))
    }
}

#[async_trait]
impl SourceAdapter for RemoteSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn acquire(&self, query: &Query) -> Result<Acquired> {
        let (listings, cache) = self.client.try_fetch(&self.endpoint, query.as_str()).await?;
        debug!(target: "scrape", source = %self.name, count = listings.len(), ?cache, "remote source answered");
        Ok(Acquired { listings, cache })
    }
}
