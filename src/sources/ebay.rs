// src/sources/ebay.rs
//! eBay "Buy It Now" search, lowest price first. Search rows are final; no
//! detail-page check.

use once_cell::sync::Lazy;
use url::Url;

use super::Site;
use crate::extract::{encode_query, is_price_range, is_shop_placeholder, scan_rows, RowSelectors};
use crate::listing::{Listing, Query};

pub const ENDPOINT: &str = "ebay";
pub const LABEL: &str = "ebay";

const RESULTS: &str = ".srp-results.srp-list.clearfix";

static ROWS: Lazy<RowSelectors> = Lazy::new(|| {
    RowSelectors::new(".s-item__info.clearfix", ".s-item__title")
        .link(".s-item__link")
        .price(r#"div.s-item__detail span[class="s-item__price"]"#)
});

static BASE: Lazy<Url> = Lazy::new(|| Url::parse("https://www.ebay.com/").expect("ebay base url"));

#[derive(Debug, Clone, Copy, Default)]
pub struct Ebay;

impl Site for Ebay {
    fn endpoint(&self) -> &'static str {
        ENDPOINT
    }

    fn label(&self) -> &'static str {
        LABEL
    }

    fn search_url(&self, query: &Query) -> String {
        format!(
            "https://www.ebay.com/sch/112529/i.html?_from=R40&_nkw={}&_sop=15&LH_BIN=1&_oac=1",
            encode_query(query.as_str())
        )
    }

    fn results_selector(&self) -> &'static str {
        RESULTS
    }

    fn extract(&self, html: &str) -> Vec<Listing> {
        scan_rows(html, &ROWS, Some(&BASE))
            .into_iter()
            // sponsored "Shop on eBay" tiles and multi-variant price ranges
            .filter(|row| !row.title.is_empty())
            .filter(|row| !is_shop_placeholder(&row.title, "EBAY"))
            .filter(|row| !is_price_range(row.price.as_deref()))
            .map(|row| Listing::new(row.title, row.link, row.price, LABEL))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
      <ul class="srp-results srp-list clearfix">
        <li><div class="s-item__info clearfix">
          <a class="s-item__link" href="https://www.ebay.com/itm/1"><div class="s-item__title">Shop on eBay</div></a>
          <div class="s-item__detail"><span class="s-item__price">$20.00</span></div>
        </div></li>
        <li><div class="s-item__info clearfix">
          <a class="s-item__link" href="https://www.ebay.com/itm/2"><div class="s-item__title">Sennheiser HD600 Headphones</div></a>
          <div class="s-item__detail"><span class="s-item__price">$249.99</span></div>
        </div></li>
        <li><div class="s-item__info clearfix">
          <a class="s-item__link" href="https://www.ebay.com/itm/3"><div class="s-item__title">HD600 replacement pads</div></a>
          <div class="s-item__detail"><span class="s-item__price">$10.00 to $50.00</span></div>
        </div></li>
      </ul>"#;

    #[test]
    fn drops_placeholders_and_ranges() {
        let got = Ebay.extract(PAGE);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].title, "Sennheiser HD600 Headphones");
        assert_eq!(got[0].link, "https://www.ebay.com/itm/2");
        assert_eq!(got[0].price.as_deref(), Some("$249.99"));
        assert_eq!(got[0].site, "ebay");
    }

    #[test]
    fn search_url_encodes_query() {
        let q = Query::parse(Some("hd 600")).unwrap();
        assert!(Ebay.search_url(&q).contains("_nkw=hd+600&"));
    }
}
