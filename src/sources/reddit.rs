// src/sources/reddit.rs
//! r/AVexchange `[WTS]` posts, newest first. Posts carry no structured price.

use once_cell::sync::Lazy;
use url::Url;

use super::Site;
use crate::extract::{contains_ci, encode_query, scan_rows, RowSelectors};
use crate::listing::{Listing, Query};

pub const ENDPOINT: &str = "reddit";
pub const LABEL: &str = "reddit";
pub const DEFAULT_MAX_LISTINGS: usize = 20;

const RESULTS: &str = r#"[data-testid="post-container"]"#;

static ROWS: Lazy<RowSelectors> =
    Lazy::new(|| RowSelectors::new(RESULTS, "h3").link(r#"a[data-click-id="body"]"#));

static BASE: Lazy<Url> = Lazy::new(|| Url::parse("https://www.reddit.com").expect("reddit base url"));

#[derive(Debug, Clone, Copy)]
pub struct Reddit {
    max_listings: usize,
}

impl Reddit {
    pub fn new(max_listings: usize) -> Self {
        Self { max_listings }
    }
}

impl Default for Reddit {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LISTINGS)
    }
}

impl Site for Reddit {
    fn endpoint(&self) -> &'static str {
        ENDPOINT
    }

    fn label(&self) -> &'static str {
        LABEL
    }

    fn search_url(&self, query: &Query) -> String {
        format!(
            "https://www.reddit.com/r/AVexchange/search/?q={}&sort=new&type=link",
            encode_query(query.as_str())
        )
    }

    fn results_selector(&self) -> &'static str {
        RESULTS
    }

    fn extract(&self, html: &str) -> Vec<Listing> {
        scan_rows(html, &ROWS, Some(&BASE))
            .into_iter()
            .filter(|row| !row.link.is_empty() && contains_ci(&row.title, "[WTS]"))
            .take(self.max_listings)
            .map(|row| Listing::new(row.title, row.link, None, LABEL))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(n: usize, tag: &str) -> String {
        format!(
            r#"<div data-testid="post-container"><a data-click-id="body" href="/r/AVexchange/comments/{n}/"><h3>{tag} HD600 #{n}</h3></a></div>"#
        )
    }

    #[test]
    fn keeps_wts_posts_up_to_the_cap() {
        let mut html = String::from("<div>");
        html.push_str(&post(0, "[WTB]"));
        for n in 1..=5 {
            html.push_str(&post(n, "[WTS]"));
        }
        html.push_str("</div>");

        let got = Reddit::new(3).extract(&html);
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].link, "https://www.reddit.com/r/AVexchange/comments/1/");
        assert!(got.iter().all(|l| l.price.is_none() && l.site == "reddit"));
    }
}
