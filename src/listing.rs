// src/listing.rs
//! Normalized listing shape shared by every marketplace adapter, plus the
//! validated search query and the on-demand numeric price derivation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One marketplace listing as shown to the shopper.
///
/// `price` keeps the site's own formatting ("$1,200.00", "0.00 USD", ...);
/// comparisons go through [`price_value`] and never rewrite it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub title: String,
    pub link: String,
    pub price: Option<String>,
    pub site: String,
}

impl Listing {
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        price: Option<String>,
        site: &str,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            price,
            site: site.to_string(),
        }
    }

    /// Numeric price for ordering only.
    pub fn price_value(&self) -> f64 {
        price_value(self.price.as_deref())
    }
}

static RE_NON_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9.]").expect("price regex"));

/// Strip everything except digits and `.` and parse the rest.
/// Missing or unparseable prices order as `0.0`.
pub fn price_value(price: Option<&str>) -> f64 {
    let Some(raw) = price else {
        return 0.0;
    };
    let digits = RE_NON_NUMERIC.replace_all(raw, "");
    digits
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Rejected query input (absent or blank after trimming).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidQuery;

impl fmt::Display for InvalidQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Invalid query")
    }
}

impl std::error::Error for InvalidQuery {}

/// A validated search term. The raw text is kept verbatim: it is both the
/// value sent to marketplaces and the cache key, so `"HD600"` and `" hd600"`
/// are different queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query(String);

impl Query {
    pub fn parse(raw: Option<&str>) -> Result<Self, InvalidQuery> {
        match raw {
            Some(s) if !s.trim().is_empty() => Ok(Self(s.to_string())),
            _ => Err(InvalidQuery),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive substring test used by title filters.
    pub fn is_contained_in(&self, text: &str) -> bool {
        text.to_uppercase().contains(&self.0.to_uppercase())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable ascending sort by derived price; ties keep source order.
pub fn sort_by_price(listings: &mut [Listing]) {
    listings.sort_by(|a, b| a.price_value().total_cmp(&b.price_value()));
}
