//! Command-line search across every configured source.
//!
//! ```text
//! search <query>                      # scrape locally with Chromium
//! search <query> --remote <base-url>  # ask a running service instead
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use av_deals::aggregate::Aggregator;
use av_deals::browser::ChromeLauncher;
use av_deals::client::ApiClient;
use av_deals::config::AppConfig;
use av_deals::sources::SourceRegistry;
use av_deals::{Listing, Query};

struct Args {
    query: String,
    remote: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut query = None;
    let mut remote = None;
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--remote" => remote = Some(it.next().context("--remote needs a base url")?),
            _ if query.is_none() => query = Some(arg),
            other => bail!("unexpected argument {other:?}"),
        }
    }
    Ok(Args {
        query: query.context("usage: search <query> [--remote <base-url>]")?,
        remote,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    av_deals::telemetry::init_tracing();

    let args = parse_args()?;
    let query = Query::parse(Some(args.query.as_str()))?;

    let listings: Vec<Listing> = match args.remote {
        Some(base) => {
            let client = ApiClient::new(base, Duration::from_secs(120))?;
            client.try_fetch("/api/search", query.as_str()).await?.0
        }
        None => {
            let cfg = AppConfig::load_default()?;
            let launcher = ChromeLauncher::new(
                cfg.chrome_executable.clone(),
                cfg.headless,
                cfg.navigation_timeout(),
            );
            let registry = SourceRegistry::from_config(&cfg, Arc::new(launcher))?;
            Aggregator::new(registry.all().to_vec()).search(&query).await
        }
    };

    println!("{}", serde_json::to_string_pretty(&listings)?);
    Ok(())
}
