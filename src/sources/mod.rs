// src/sources/mod.rs
pub mod ebay;
pub mod headfi;
pub mod mart;
pub mod reddit;
pub mod remote;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use tracing::{info, warn};

use crate::browser::{BrowserLauncher, SessionGuard, SessionProfile, TabGuard};
use crate::cache::{CacheStatus, QueryCache};
use crate::config::AppConfig;
use crate::listing::{Listing, Query};
use crate::pool::BatchPool;
use crate::verify::{verify_candidates, Candidate, DetailCheck};

/// Outcome of one acquisition. `cache` is `None` when the source has no
/// cache of its own to report on.
#[derive(Debug, Clone, PartialEq)]
pub struct Acquired {
    pub listings: Vec<Listing>,
    pub cache: Option<CacheStatus>,
}

/// A listing source: one marketplace scraper or a remote endpoint.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;
    async fn acquire(&self, query: &Query) -> Result<Acquired>;
    fn cache(&self) -> Option<&QueryCache> {
        None
    }
}

/// Site-specific scraping rules plugged into [`MarketAdapter`].
pub trait Site: Send + Sync + 'static {
    /// Registry key and route segment.
    fn endpoint(&self) -> &'static str;
    /// Value written to `Listing::site`.
    fn label(&self) -> &'static str;
    fn search_url(&self, query: &Query) -> String;
    /// Container that exists only when the search returned results.
    fn results_selector(&self) -> &'static str;
    fn profile(&self) -> SessionProfile {
        SessionProfile::plain()
    }
    /// Rows that survive the site's noise filter.
    fn extract(&self, html: &str) -> Vec<Listing>;
    /// Detail-page check for sites that cannot show availability in search.
    fn verification(&self) -> Option<&DetailCheck> {
        None
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScrapeSettings {
    pub selector_timeout: Duration,
    pub verify_pool: BatchPool,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            selector_timeout: Duration::from_secs(30),
            verify_pool: BatchPool::default(),
        }
    }
}

/// Cache-fronted browser scraper for one [`Site`].
pub struct MarketAdapter<S> {
    site: S,
    launcher: Arc<dyn BrowserLauncher>,
    cache: Arc<QueryCache>,
    settings: ScrapeSettings,
}

impl<S: Site> MarketAdapter<S> {
    pub fn new(
        site: S,
        launcher: Arc<dyn BrowserLauncher>,
        cache: Arc<QueryCache>,
        settings: ScrapeSettings,
    ) -> Self {
        Self {
            site,
            launcher,
            cache,
            settings,
        }
    }

    /// Launch a session, scrape, and tear the session down on every path.
    async fn scrape(&self, query: &Query) -> Result<Vec<Listing>> {
        let source = self.site.endpoint();
        let started = Instant::now();

        let outcome = match SessionGuard::launch(self.launcher.as_ref(), &self.site.profile()).await {
            Ok(session) => {
                let outcome = self.scrape_in(&session, query).await;
                session.close().await;
                outcome
            }
            Err(e) => Err(e),
        };

        histogram!("scrape_acquire_ms", "source" => source)
            .record(started.elapsed().as_secs_f64() * 1_000.0);
        match &outcome {
            Ok(listings) => {
                counter!("scrape_listings_total", "source" => source).increment(listings.len() as u64);
                info!(target: "scrape", source, site = self.site.label(), %query, count = listings.len(), "scrape finished");
            }
            Err(e) => {
                counter!("scrape_acquire_errors_total", "source" => source).increment(1);
                warn!(target: "scrape", source, %query, error = ?e, "scraping error");
            }
        }
        outcome
    }

    async fn scrape_in(&self, session: &SessionGuard, query: &Query) -> Result<Vec<Listing>> {
        let tab = session.open_tab().await?;
        let found = self.search_page(&tab, query).await;
        tab.close().await;
        let found = found?;

        match self.site.verification() {
            Some(check) if !found.is_empty() => {
                let candidates = found
                    .into_iter()
                    .map(|listing| Candidate {
                        listing,
                        query: query.clone(),
                    })
                    .collect();
                Ok(verify_candidates(session, check, candidates, &self.settings.verify_pool).await)
            }
            _ => Ok(found),
        }
    }

    async fn search_page(&self, tab: &TabGuard, query: &Query) -> Result<Vec<Listing>> {
        tab.goto(&self.site.search_url(query)).await?;

        let selector = self.site.results_selector();
        if !tab.wait_for(selector, self.settings.selector_timeout).await? {
            info!(target: "scrape", source = self.site.endpoint(), selector, "no results container");
            return Ok(Vec::new());
        }

        let html = tab.content().await?;
        Ok(self.site.extract(&html))
    }
}

#[async_trait]
impl<S: Site> SourceAdapter for MarketAdapter<S> {
    fn name(&self) -> &str {
        self.site.endpoint()
    }

    async fn acquire(&self, query: &Query) -> Result<Acquired> {
        let (listings, status) = self
            .cache
            .get_or_acquire(query, || self.scrape(query))
            .await?;
        Ok(Acquired {
            listings,
            cache: Some(status),
        })
    }

    fn cache(&self) -> Option<&QueryCache> {
        Some(&self.cache)
    }
}

/// Registered sources by name, in configuration order.
#[derive(Default)]
pub struct SourceRegistry {
    by_name: BTreeMap<String, Arc<dyn SourceAdapter>>,
    order: Vec<Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    /// Build the configured marketplace adapters (each with its own cache and
    /// periodic clear) plus any remote endpoints. Must run inside a Tokio runtime.
    pub fn from_config(cfg: &AppConfig, launcher: Arc<dyn BrowserLauncher>) -> Result<Self> {
        let settings = ScrapeSettings {
            selector_timeout: cfg.selector_timeout(),
            verify_pool: BatchPool::new(cfg.verify_batch_size),
        };
        let mut registry = Self::default();

        for name in &cfg.sources {
            let adapter: Arc<dyn SourceAdapter> = match name.as_str() {
                ebay::ENDPOINT => market(ebay::Ebay, &launcher, settings, cfg),
                headfi::ENDPOINT => market(headfi::HeadFi::new(), &launcher, settings, cfg),
                mart::ENDPOINT => market(
                    mart::AudioMart::new(cfg.stealth_user_agent.clone()),
                    &launcher,
                    settings,
                    cfg,
                ),
                reddit::ENDPOINT => market(
                    reddit::Reddit::new(cfg.reddit_max_listings),
                    &launcher,
                    settings,
                    cfg,
                ),
                other => bail!("unknown source `{other}` in config"),
            };
            registry.register(adapter)?;
        }

        for remote in &cfg.remote {
            let adapter = remote::RemoteSource::from_config(remote, cfg.navigation_timeout())?;
            registry.register(Arc::new(adapter))?;
        }

        Ok(registry)
    }

    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) -> Result<()> {
        let name = adapter.name().to_string();
        if self.by_name.contains_key(&name) {
            bail!("source `{name}` registered twice");
        }
        self.by_name.insert(name, adapter.clone());
        self.order.push(adapter);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.by_name.get(name).cloned()
    }

    pub fn all(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.order
    }

    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|a| a.name()).collect()
    }
}

fn market<S: Site>(
    site: S,
    launcher: &Arc<dyn BrowserLauncher>,
    settings: ScrapeSettings,
    cfg: &AppConfig,
) -> Arc<dyn SourceAdapter> {
    let cache = Arc::new(QueryCache::new(site.endpoint()));
    cache.spawn_periodic_clear(cfg.cache_clear_interval());
    Arc::new(MarketAdapter::new(site, launcher.clone(), cache, settings))
}
