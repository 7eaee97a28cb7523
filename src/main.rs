//! Listing service binary entrypoint.
//! Boots the Axum HTTP server with every configured marketplace source.
//!
//! See `README.md` for routes and configuration.

use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    av_deals::telemetry::init_tracing();

    let router = av_deals::app().await?;
    Ok(router.into())
}
