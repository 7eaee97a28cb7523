// src/extract.rs
//! Rendered-markup extraction and the noise filters shared by the site adapters.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// CSS selectors describing one search-result row.
#[derive(Debug, Clone)]
pub struct RowSelectors {
    row: Selector,
    title: Selector,
    link: Option<Selector>,
    price: Option<Selector>,
    flair: Option<Selector>,
}

impl RowSelectors {
    /// Panics on an invalid selector; callers pass compile-time constants.
    pub fn new(row: &str, title: &str) -> Self {
        Self {
            row: css(row),
            title: css(title),
            link: None,
            price: None,
            flair: None,
        }
    }

    /// Element carrying the `href`. Without it the title element's `href` is used.
    pub fn link(mut self, selector: &str) -> Self {
        self.link = Some(css(selector));
        self
    }

    pub fn price(mut self, selector: &str) -> Self {
        self.price = Some(css(selector));
        self
    }

    pub fn flair(mut self, selector: &str) -> Self {
        self.flair = Some(css(selector));
        self
    }
}

pub fn css(selector: &str) -> Selector {
    Selector::parse(selector).unwrap_or_else(|e| panic!("invalid selector `{selector}`: {e}"))
}

/// One result row before site-specific filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub title: String,
    pub link: String,
    pub price: Option<String>,
    pub flair: Option<String>,
}

/// Extract every row matching `selectors`. Relative links are resolved
/// against `base`; rows without a title element yield an empty title.
pub fn scan_rows(html: &str, selectors: &RowSelectors, base: Option<&Url>) -> Vec<RawRow> {
    let doc = Html::parse_document(html);
    doc.select(&selectors.row)
        .map(|row| {
            let title_el = row.select(&selectors.title).next();
            let link_el = match &selectors.link {
                Some(sel) => row.select(sel).next(),
                None => title_el,
            };
            RawRow {
                title: title_el.map(text_of).unwrap_or_default(),
                link: link_el
                    .and_then(|el| el.value().attr("href"))
                    .map(|href| absolutize(href, base))
                    .unwrap_or_default(),
                price: first_text(row, selectors.price.as_ref()),
                flair: first_text(row, selectors.flair.as_ref()),
            }
        })
        .collect()
}

/// Text of the first element matching `selector`, e.g. a detail-page title.
pub fn first_match_text(html: &str, selector: &Selector) -> Option<String> {
    let doc = Html::parse_document(html);
    doc.select(selector)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
}

fn first_text(row: ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
    selector
        .and_then(|sel| row.select(sel).next())
        .map(text_of)
        .filter(|t| !t.is_empty())
}

/// Element text with whitespace runs collapsed and ends trimmed.
fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn absolutize(href: &str, base: Option<&Url>) -> String {
    match base {
        Some(base) => base
            .join(href)
            .map(String::from)
            .unwrap_or_else(|_| href.to_string()),
        None => href.to_string(),
    }
}

/// Percent-encode a query for use as a URL parameter value.
pub fn encode_query(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_uppercase().contains(&needle.to_uppercase())
}

pub fn contains_any_ci(haystack: &str, needles: &[&str]) -> bool {
    let upper = haystack.to_uppercase();
    needles.iter().any(|n| upper.contains(&n.to_uppercase()))
}

/// Sponsored "SHOP ON <SITE>" placeholder rows.
pub fn is_shop_placeholder(title: &str, site: &str) -> bool {
    contains_ci(title, &format!("SHOP ON {site}"))
}

static RE_PRICE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bto\b").expect("price range regex"));

/// "$10.00 to $50.00" style prices (multi-variant listings).
pub fn is_price_range(price: Option<&str>) -> bool {
    price.is_some_and(|p| RE_PRICE_RANGE.is_match(p))
}

static RE_LEADING_ZERO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^0-9]*0+(?:[.,]0+)?(?:[^0-9.,]|$)").expect("zero price regex"));

/// Zero-value price ("0.00", "$0", "0.00 USD"): a want-to-buy post, not a sale.
pub fn is_zero_price(price: Option<&str>) -> bool {
    price.is_some_and(|p| RE_LEADING_ZERO.is_match(p.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROWS: &str = r#"
        <ul>
          <li class="r">
            <a class="t" href="/item/1">  Sennheiser
               HD600 </a>
            <span class="p">$250.00</span>
            <span class="f">For Sale</span>
          </li>
          <li class="r">
            <a class="t" href="https://other.test/abs">Grado SR80e</a>
          </li>
          <li class="r"><span class="p">$5</span></li>
        </ul>"#;

    #[test]
    fn scan_rows_extracts_fields_and_resolves_links() {
        let sels = RowSelectors::new("li.r", "a.t").price(".p").flair(".f");
        let base = Url::parse("https://site.test").unwrap();
        let rows = scan_rows(ROWS, &sels, Some(&base));

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].title, "Sennheiser HD600");
        assert_eq!(rows[0].link, "https://site.test/item/1");
        assert_eq!(rows[0].price.as_deref(), Some("$250.00"));
        assert_eq!(rows[0].flair.as_deref(), Some("For Sale"));
        assert_eq!(rows[1].link, "https://other.test/abs");
        assert_eq!(rows[1].price, None);
        assert_eq!(rows[2].title, "");
        assert_eq!(rows[2].link, "");
    }

    #[test]
    fn first_match_text_skips_empty() {
        let sel = css(".p-title-value");
        let html = r#"<h1 class="p-title-value"> SOLD: HD600 </h1>"#;
        assert_eq!(first_match_text(html, &sel).as_deref(), Some("SOLD: HD600"));
        assert_eq!(first_match_text("<h1 class='p-title-value'> </h1>", &sel), None);
        assert_eq!(first_match_text("<p>none</p>", &sel), None);
    }

    #[test]
    fn noise_filters() {
        assert!(is_shop_placeholder("Shop on eBay", "EBAY"));
        assert!(!is_shop_placeholder("Sennheiser HD600", "EBAY"));
        assert!(is_price_range(Some("$10.00 to $50.00")));
        assert!(!is_price_range(Some("$10.00")));
        assert!(!is_price_range(Some("Toronto pickup $40")));
        assert!(!is_price_range(None));
    }

    #[test]
    fn zero_prices() {
        assert!(is_zero_price(Some("0.00")));
        assert!(is_zero_price(Some("$0.00 USD")));
        assert!(is_zero_price(Some("0")));
        assert!(!is_zero_price(Some("0.50")));
        assert!(!is_zero_price(Some("$100.00")));
        assert!(!is_zero_price(Some("10.00")));
        assert!(!is_zero_price(None));
    }

    #[test]
    fn query_encoding() {
        assert_eq!(encode_query("hd 600&x"), "hd+600%26x");
    }
}
