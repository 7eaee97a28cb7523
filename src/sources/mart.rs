// src/sources/mart.rs
//! US Audio Mart. The site rejects obvious automation, so sessions are
//! launched with the hardened profile.

use once_cell::sync::Lazy;
use url::Url;

use super::Site;
use crate::browser::SessionProfile;
use crate::extract::{contains_ci, encode_query, scan_rows, RowSelectors};
use crate::listing::{Listing, Query};

pub const ENDPOINT: &str = "mart";
pub const LABEL: &str = "usaudiomart";

const RESULTS: &str = "table.adverttable tbody tr.ad";

static ROWS: Lazy<RowSelectors> =
    Lazy::new(|| RowSelectors::new("table.adverttable tr.ad", "a").price(".rightCell"));

static BASE: Lazy<Url> =
    Lazy::new(|| Url::parse("https://www.usaudiomart.com/").expect("usaudiomart base url"));

#[derive(Debug, Clone)]
pub struct AudioMart {
    user_agent: String,
}

impl AudioMart {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

impl Site for AudioMart {
    fn endpoint(&self) -> &'static str {
        ENDPOINT
    }

    fn label(&self) -> &'static str {
        LABEL
    }

    fn search_url(&self, query: &Query) -> String {
        format!(
            "https://www.usaudiomart.com/search.php?show_other_marts=N&show_msrp=N&keywords={}&type=ALL+SALE+ADS&type=ALL+SALE+ADS&cat_id=&price_min=&price_max=&province=&titlesearch=on&zipcode=&radius=100",
            encode_query(query.as_str())
        )
    }

    fn results_selector(&self) -> &'static str {
        RESULTS
    }

    fn profile(&self) -> SessionProfile {
        SessionProfile::hardened(self.user_agent.clone())
    }

    fn extract(&self, html: &str) -> Vec<Listing> {
        scan_rows(html, &ROWS, Some(&BASE))
            .into_iter()
            .filter(|row| !row.title.is_empty() && !contains_ci(&row.title, "SOLD"))
            .map(|row| Listing::new(row.title, row.link, row.price, LABEL))
            .collect()
    }
}
