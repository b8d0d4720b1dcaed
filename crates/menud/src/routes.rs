//! API routes for menud.

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use menu_common::{
    ErrorBody, ExplainRequest, ExplainResponse, HealthResponse, SearchCandidate, SearchRequest,
    SearchResponse,
};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::governor::AdmitError;
use crate::quota::QuotaContext;
use crate::resolver::{ExplanationSource, ResolveError, ResolveRequest};
use crate::server::AppState;

type AppStateArc = Arc<AppState>;

// ============================================================================
// Explain route
// ============================================================================

pub fn explain_routes() -> Router<AppStateArc> {
    Router::new().route("/explain", post(explain_dish))
}

async fn explain_dish(
    State(state): State<AppStateArc>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<ExplainRequest>,
) -> Response {
    let started = Instant::now();
    let client_key = client_key(&headers, connect_info.map(|c| c.0));

    if let Err(denied) = state
        .governor
        .admit(&client_key, origin_header(&headers).as_deref())
    {
        return admit_denied(denied);
    }

    let ctx = match auth_context(&state, &headers, &client_key) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };

    info!("Explain request: '{}' ({})", req.dish_name, req.language);

    let restaurant_id = req.restaurant_id.as_deref().and_then(|raw| match raw.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!("Ignoring non-numeric restaurantId {raw:?}");
            None
        }
    });
    let resolve_req = ResolveRequest {
        dish_name: req.dish_name,
        language: req.language,
        restaurant_id,
        restaurant_name: req.restaurant_name,
    };

    match state.resolver.resolve(&resolve_req, &ctx).await {
        Ok(resolved) => {
            let elapsed_ms = started.elapsed().as_millis();
            let mut info_headers = vec![
                ("x-wtm-source", resolved.source.as_str().to_string()),
                ("x-wtm-processing-ms", elapsed_ms.to_string()),
            ];
            if resolved.source == ExplanationSource::Cache {
                if let Some(score) = resolved.match_score {
                    info_headers.push(("x-wtm-match-score", format!("{score:.3}")));
                }
            }

            (
                AppendHeaders(info_headers),
                Json(ExplainResponse {
                    explanation: resolved.explanation,
                    tags: resolved.tags,
                    allergens: resolved.allergens,
                    cuisine: resolved.cuisine,
                }),
            )
                .into_response()
        }
        Err(e) => resolve_failed(e),
    }
}

fn admit_denied(denied: AdmitError) -> Response {
    match denied {
        AdmitError::ForbiddenOrigin => {
            (StatusCode::FORBIDDEN, "origin not allowed".to_string()).into_response()
        }
        AdmitError::RateLimited => (
            StatusCode::TOO_MANY_REQUESTS,
            "rate limit exceeded, retry later".to_string(),
        )
            .into_response(),
    }
}

fn resolve_failed(e: ResolveError) -> Response {
    match e {
        ResolveError::UnsupportedLanguage(_) | ResolveError::MissingInput => {
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        ResolveError::QuotaExceeded => {
            (StatusCode::TOO_MANY_REQUESTS, e.to_string()).into_response()
        }
        ResolveError::GenerationFailed(_) => {
            warn!("Resolution failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Bearer token -> quota context. Unknown tokens are rejected; an absent
/// header is an anonymous caller.
fn auth_context(
    state: &AppState,
    headers: &HeaderMap,
    client_key: &str,
) -> Result<QuotaContext, Response> {
    let Some(value) = headers.get("authorization") else {
        return Ok(QuotaContext::anonymous(client_key));
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or("");

    match state.auth_tokens.get(token) {
        Some(user_id) => Ok(QuotaContext::authenticated(user_id.clone(), client_key)),
        None => Err((StatusCode::UNAUTHORIZED, "invalid token".to_string()).into_response()),
    }
}

fn origin_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("origin")
        .or_else(|| headers.get("referer"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Client identity for rate limiting: first forwarded address, else the
/// peer address, else a shared bucket.
fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

// ============================================================================
// Search route (interactive, lower-stakes lookups)
// ============================================================================

pub fn search_routes() -> Router<AppStateArc> {
    Router::new().route("/corpus/search", post(search_corpus))
}

const SEARCH_LIMIT: usize = 20;

async fn search_corpus(
    State(state): State<AppStateArc>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<SearchRequest>,
) -> Response {
    let client_key = client_key(&headers, connect_info.map(|c| c.0));
    if let Err(denied) = state
        .governor
        .admit(&client_key, origin_header(&headers).as_deref())
    {
        return admit_denied(denied);
    }

    let language = match menu_common::DisplayLanguage::from_str(&req.language) {
        Ok(language) => language,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    // Interactive path: a degraded corpus just means no suggestions.
    let slice = match state.store.query_by_language(language).await {
        Ok(slice) => slice,
        Err(e) => {
            warn!("Corpus read failed during search: {e}");
            Vec::new()
        }
    };

    let candidates = state
        .search_matcher
        .rank(&req.query, &slice, SEARCH_LIMIT)
        .into_iter()
        .map(|(record, score)| SearchCandidate {
            name: record.name,
            explanation: record.explanation,
            cuisine: record.cuisine,
            score,
        })
        .collect();

    Json(SearchResponse { candidates }).into_response()
}

// ============================================================================
// Health route
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    let corpus_entries = state.store.count().await.unwrap_or(0);

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        corpus_entries,
    })
}
