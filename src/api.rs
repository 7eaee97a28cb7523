// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header::HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{debug, error};

use crate::aggregate::Aggregator;
use crate::client::CACHE_HEADER;
use crate::listing::{InvalidQuery, Query as SearchQuery};
use crate::sources::SourceRegistry;

#[derive(Clone)]
pub struct AppState {
    pub sources: Arc<SourceRegistry>,
    pub aggregator: Arc<Aggregator>,
}

impl AppState {
    /// The aggregator fans out to every registered source.
    pub fn new(sources: SourceRegistry) -> Self {
        let aggregator = Aggregator::new(sources.all().to_vec());
        Self {
            sources: Arc::new(sources),
            aggregator: Arc::new(aggregator),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/search", get(search_all))
        .route("/api/{source}", get(search_source))
        .route("/debug/cache", get(debug_cache))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn error_json(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "error": msg }))).into_response()
}

/// Raw query-string pairs, in request order.
type Params = Result<Query<Vec<(String, String)>>, QueryRejection>;

/// `?query=` must be given exactly once and not be blank. Malformed query
/// strings count as missing.
fn parse_query(params: Params) -> Result<SearchQuery, Response> {
    let invalid = |e: InvalidQuery| error_json(StatusCode::BAD_REQUEST, &e.to_string());
    let Ok(Query(pairs)) = params else {
        return Err(invalid(InvalidQuery));
    };
    let mut values = pairs.into_iter().filter(|(k, _)| k == "query").map(|(_, v)| v);
    let raw = values.next();
    if values.next().is_some() {
        return Err(invalid(InvalidQuery));
    }
    SearchQuery::parse(raw.as_deref()).map_err(invalid)
}

async fn search_source(
    State(state): State<AppState>,
    Path(source): Path<String>,
    params: Params,
) -> Response {
    let Some(adapter) = state.sources.get(&source) else {
        return error_json(StatusCode::NOT_FOUND, "Unknown source");
    };
    let query = match parse_query(params) {
        Ok(q) => q,
        Err(resp) => return resp,
    };

    match adapter.acquire(&query).await {
        Ok(acquired) => {
            let mut resp = Json(acquired.listings).into_response();
            if let Some(status) = acquired.cache {
                resp.headers_mut().insert(
                    HeaderName::from_static(CACHE_HEADER),
                    HeaderValue::from_static(status.as_header()),
                );
            }
            resp
        }
        Err(e) => {
            error!(target: "scrape", %source, %query, error = ?e, "request failed");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "Failed to retrieve listings")
        }
    }
}

async fn search_all(
    State(state): State<AppState>,
    params: Params,
) -> Response {
    let query = match parse_query(params) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    debug!(target: "aggregate", %query, "merged search requested");
    Json(state.aggregator.search(&query).await).into_response()
}

#[derive(Serialize)]
struct CacheInfo {
    source: String,
    entries: usize,
    last_cleared: DateTime<Utc>,
}

async fn debug_cache(State(state): State<AppState>) -> Json<Vec<CacheInfo>> {
    let out = state
        .sources
        .all()
        .iter()
        .filter_map(|s| {
            s.cache().map(|c| CacheInfo {
                source: s.name().to_string(),
                entries: c.len(),
                last_cleared: c.last_cleared(),
            })
        })
        .collect();
    Json(out)
}
