// src/metrics.rs
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

// One recorder per process; later `init` calls reuse it.
static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder (once) and publish the configured
    /// cache clear interval as a static gauge.
    pub fn init(cache_clear_secs: u64) -> Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                let handle = PrometheusBuilder::new()
                    .install_recorder()
                    .context("prometheus: install recorder")?;
                describe();
                Ok::<_, anyhow::Error>(handle)
            })?
            .clone();

        gauge!("scrape_cache_clear_interval_secs").set(cache_clear_secs as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("scrape_cache_hits_total", "Adapter responses served from the query cache");
    describe_counter!("scrape_cache_misses_total", "Adapter requests that ran a fresh scrape");
    describe_counter!("scrape_cache_clears_total", "Full cache clears");
    describe_counter!("scrape_acquire_errors_total", "Failed scrapes");
    describe_counter!("scrape_listings_total", "Listings returned by fresh scrapes");
    describe_histogram!("scrape_acquire_ms", "Wall time of one scrape, session launch to teardown");
    describe_counter!("verify_candidates_total", "Candidates sent to detail-page verification");
    describe_counter!("verify_excluded_total", "Candidates dropped by verification");
    describe_counter!("aggregate_source_failures_total", "Sources that failed during a merged search");
    describe_counter!("client_fetch_errors_total", "Bridge fetches that fell back to an empty list");
}
