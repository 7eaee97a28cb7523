// src/sources/headfi.rs
//! Head-Fi classifieds. The search page cannot tell sold listings apart, so
//! every candidate is re-checked on its detail page.

use once_cell::sync::Lazy;
use url::Url;

use super::Site;
use crate::extract::{contains_any_ci, encode_query, scan_rows, RowSelectors};
use crate::listing::{Listing, Query};
use crate::verify::DetailCheck;

pub const ENDPOINT: &str = "headfi";
pub const LABEL: &str = "headfi";

const RESULTS: &str = ".block-row";
const DETAIL_TITLE: &str = ".p-title-value";
/// Flair labels of posts that are not for sale.
const SKIPPED_FLAIRS: &[&str] = &["TRADE", "WANT TO BUY"];

static ROWS: Lazy<RowSelectors> = Lazy::new(|| {
    RowSelectors::new(".block-row", ".contentRow-title a")
        .price(".contentRow-extra dd")
        .flair("span.label.label--primary")
});

static BASE: Lazy<Url> =
    Lazy::new(|| Url::parse("https://www.head-fi.org").expect("head-fi base url"));

#[derive(Debug, Clone)]
pub struct HeadFi {
    detail: DetailCheck,
}

impl HeadFi {
    pub fn new() -> Self {
        Self {
            detail: DetailCheck::new(DETAIL_TITLE),
        }
    }
}

impl Default for HeadFi {
    fn default() -> Self {
        Self::new()
    }
}

impl Site for HeadFi {
    fn endpoint(&self) -> &'static str {
        ENDPOINT
    }

    fn label(&self) -> &'static str {
        LABEL
    }

    fn search_url(&self, query: &Query) -> String {
        format!(
            "https://www.head-fi.org/search/39110786/?q={}&t=hfc_listing&c[categories][0]=1&c[child_categories]=1&o=date",
            encode_query(query.as_str())
        )
    }

    fn results_selector(&self) -> &'static str {
        RESULTS
    }

    fn extract(&self, html: &str) -> Vec<Listing> {
        scan_rows(html, &ROWS, Some(&BASE))
            .into_iter()
            .filter(|row| !row.title.is_empty() && !row.link.is_empty())
            .filter(|row| {
                !row
                    .flair
                    .as_deref()
                    .is_some_and(|f| contains_any_ci(f, SKIPPED_FLAIRS))
            })
            .map(|row| Listing::new(row.title, row.link, row.price, LABEL))
            .collect()
    }

    fn verification(&self) -> Option<&DetailCheck> {
        Some(&self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
      <ol>
        <li class="block-row">
          <h3 class="contentRow-title"><a href="/classifieds/sennheiser-hd600.1001/">Sennheiser HD600</a></h3>
          <span class="label label--primary">For Sale</span>
          <dl class="contentRow-extra"><dd>250.00 USD</dd></dl>
        </li>
        <li class="block-row">
          <h3 class="contentRow-title"><a href="/classifieds/hd600-wanted.1002/">HD600 wanted</a></h3>
          <span class="label label--primary">Want To Buy</span>
          <dl class="contentRow-extra"><dd>0.00 USD</dd></dl>
        </li>
        <li class="block-row">
          <h3 class="contentRow-title"><a href="/classifieds/hd600-for-hd650.1003/">HD600 for HD650</a></h3>
          <span class="label label--primary">For Sale/Trade</span>
        </li>
        <li class="block-row"><h3 class="contentRow-title">no link</h3></li>
      </ol>"#;

    #[test]
    fn filters_flairs_and_absolutizes_links() {
        let got = HeadFi::new().extract(PAGE);
        assert_eq!(got.len(), 1);
        assert_eq!(
            got[0].link,
            "https://www.head-fi.org/classifieds/sennheiser-hd600.1001/"
        );
        assert_eq!(got[0].price.as_deref(), Some("250.00 USD"));
        assert!(HeadFi::new().verification().is_some());
    }
}
