// src/verify.rs
//! Second-stage availability check for sites whose search page cannot say
//! "already sold". Each candidate's detail page is opened in its own tab and
//! its canonical title decides inclusion.

use metrics::counter;
use scraper::Selector;
use tracing::{debug, warn};

use crate::browser::SessionGuard;
use crate::extract::{contains_any_ci, css, first_match_text, is_zero_price};
use crate::listing::{Listing, Query};
use crate::pool::BatchPool;

/// Canonical-title words that mean the listing is gone.
pub const UNAVAILABLE_MARKERS: &[&str] = &["SOLD", "PURCHASED", "CLOSED", "TRADED"];

/// A search-page listing awaiting verification against its detail page.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub listing: Listing,
    pub query: Query,
}

/// Where the canonical title lives on a detail page.
#[derive(Debug, Clone)]
pub struct DetailCheck {
    title: Selector,
}

impl DetailCheck {
    pub fn new(title_selector: &str) -> Self {
        Self {
            title: css(title_selector),
        }
    }

    pub fn canonical_title(&self, html: &str) -> Option<String> {
        first_match_text(html, &self.title)
    }
}

/// Inclusion rule. A candidate survives only if its detail page has a title,
/// that title carries no unavailability marker and contains the query, and
/// its price is not a zero-value "want" post.
pub fn keep_candidate(canonical_title: Option<&str>, candidate: &Candidate) -> bool {
    let Some(title) = canonical_title else {
        return false;
    };
    !contains_any_ci(title, UNAVAILABLE_MARKERS)
        && candidate.query.is_contained_in(title)
        && !is_zero_price(candidate.listing.price.as_deref())
}

/// Filter `candidates` through their detail pages using `pool` for batching.
/// Never returns more listings than it was given; order is preserved.
pub async fn verify_candidates(
    session: &SessionGuard,
    check: &DetailCheck,
    candidates: Vec<Candidate>,
    pool: &BatchPool,
) -> Vec<Listing> {
    let total = candidates.len();
    let checked = pool
        .run(candidates, |candidate| check_one(session, check, candidate))
        .await;
    let kept: Vec<Listing> = checked.into_iter().flatten().collect();

    counter!("verify_candidates_total").increment(total as u64);
    counter!("verify_excluded_total").increment((total - kept.len()) as u64);
    debug!(target: "verify", total, kept = kept.len(), "verification done");
    kept
}

async fn check_one(session: &SessionGuard, check: &DetailCheck, candidate: Candidate) -> Option<Listing> {
    let tab = match session.open_tab().await {
        Ok(tab) => tab,
        Err(e) => {
            warn!(target: "verify", link = %candidate.listing.link, error = ?e, "could not open tab");
            return None;
        }
    };

    let fetched = async {
        tab.goto(&candidate.listing.link).await?;
        tab.content().await
    }
    .await;
    tab.close().await;

    match fetched {
        Ok(html) => {
            let title = check.canonical_title(&html);
            keep_candidate(title.as_deref(), &candidate).then_some(candidate.listing)
        }
        Err(e) => {
            warn!(target: "verify", link = %candidate.listing.link, error = ?e, "error processing listing");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(price: Option<&str>, query: &str) -> Candidate {
        Candidate {
            listing: Listing::new(
                "FS: Sennheiser HD600",
                "https://www.head-fi.org/classifieds/1",
                price.map(str::to_string),
                "headfi",
            ),
            query: Query::parse(Some(query)).unwrap(),
        }
    }

    #[test]
    fn sold_in_any_case_is_excluded() {
        let c = cand(Some("250.00"), "hd600");
        assert!(!keep_candidate(Some("SOLD - Sennheiser HD600"), &c));
        assert!(!keep_candidate(Some("Sennheiser HD600 (sold)"), &c));
        assert!(!keep_candidate(Some("Sennheiser HD600 purchased, thanks"), &c));
        assert!(!keep_candidate(Some("[Closed] Sennheiser HD600"), &c));
        assert!(!keep_candidate(Some("Traded: Sennheiser HD600"), &c));
        assert!(keep_candidate(Some("FS: Sennheiser HD600"), &c));
    }

    #[test]
    fn title_must_contain_query() {
        let c = cand(Some("250.00"), "HD600");
        assert!(!keep_candidate(Some("FS: Sennheiser HD650"), &c));
        assert!(keep_candidate(Some("fs: sennheiser hd600 w/ cable"), &c));
    }

    #[test]
    fn zero_price_and_missing_title_are_excluded() {
        assert!(!keep_candidate(Some("WTB: HD600"), &cand(Some("0.00"), "hd600")));
        assert!(!keep_candidate(None, &cand(Some("250.00"), "hd600")));
        assert!(keep_candidate(Some("FS: HD600"), &cand(None, "hd600")));
    }
}
