// src/aggregate.rs
//! Fan a query out to every registered source and merge the results.

use std::sync::Arc;

use metrics::counter;
use tracing::{info, warn};

use crate::listing::{sort_by_price, Listing, Query};
use crate::sources::SourceAdapter;

#[derive(Clone)]
pub struct Aggregator {
    sources: Vec<Arc<dyn SourceAdapter>>,
}

impl Aggregator {
    pub fn new(sources: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self { sources }
    }

    /// One acquisition per source, concurrently. A failing (or panicking)
    /// source contributes nothing; the merge is always returned, sorted
    /// ascending by derived price with source order kept for ties.
    pub async fn search(&self, query: &Query) -> Vec<Listing> {
        let tasks: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source = source.clone();
                let query = query.clone();
                tokio::spawn(async move { source.acquire(&query).await })
            })
            .collect();

        let mut merged = Vec::new();
        let mut failed = 0usize;
        for (source, task) in self.sources.iter().zip(tasks) {
            let outcome = match task.await {
                Ok(res) => res,
                Err(join_err) => Err(anyhow::anyhow!("source task aborted: {join_err}")),
            };
            match outcome {
                Ok(acquired) => merged.extend(acquired.listings),
                Err(e) => {
                    failed += 1;
                    counter!("aggregate_source_failures_total", "source" => source.name().to_string())
                        .increment(1);
                    warn!(target: "aggregate", source = source.name(), error = ?e, "source failed; skipping");
                }
            }
        }

        sort_by_price(&mut merged);
        info!(target: "aggregate", %query, sources = self.sources.len(), failed, count = merged.len(), "merged search");
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::Acquired;
    use anyhow::{bail, Result};
    use async_trait::async_trait;

    struct Fixed(&'static str, Option<&'static str>);

    #[async_trait]
    impl SourceAdapter for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        async fn acquire(&self, _query: &Query) -> Result<Acquired> {
            match self.1 {
                Some(price) => Ok(Acquired {
                    listings: vec![Listing::new(
                        format!("{} item", self.0),
                        "https://x.test",
                        Some(price.to_string()),
                        self.0,
                    )],
                    cache: None,
                }),
                None => bail!("{} is down", self.0),
            }
        }
    }

    struct Panics;

    #[async_trait]
    impl SourceAdapter for Panics {
        fn name(&self) -> &str {
            "panics"
        }

        async fn acquire(&self, _query: &Query) -> Result<Acquired> {
            panic!("adapter bug")
        }
    }

    #[tokio::test]
    async fn merges_sorts_and_skips_failures() {
        let agg = Aggregator::new(vec![
            Arc::new(Fixed("a", Some("$50"))),
            Arc::new(Fixed("b", None)),
            Arc::new(Panics),
            Arc::new(Fixed("c", Some("$10"))),
        ]);
        let out = agg.search(&Query::parse(Some("hd600")).unwrap()).await;
        let prices: Vec<_> = out.iter().map(|l| l.price.as_deref().unwrap()).collect();
        assert_eq!(prices, vec!["$10", "$50"]);
        assert_eq!(out[0].site, "c");
    }

    #[tokio::test]
    async fn all_failing_gives_empty() {
        let agg = Aggregator::new(vec![Arc::new(Fixed("b", None))]);
        assert!(agg.search(&Query::parse(Some("x")).unwrap()).await.is_empty());
    }
}
