//! HTTP surface: the authenticated `/api/v1` API plus health and metrics.

mod meal_plans;
mod receipts;
mod tips;
mod token_usage;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use centavo_ai::Advice;
use centavo_core::ledger::NewTokenUsage;
use centavo_core::RequestType;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::require_session;
use crate::error::ApiError;
use crate::health::health_router;
use crate::state::{AppState, SharedState};

/// Time allowed for writing one ledger entry.
const LEDGER_TIMEOUT: Duration = Duration::from_secs(5);

/// Receipt images arrive base64-encoded in the JSON body.
const RECEIPT_BODY_LIMIT: usize = 12 * 1024 * 1024;

pub fn app(state: SharedState) -> Router {
    Router::new()
        .nest("/api/v1", api_router(state.clone()))
        .merge(health_router(state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

fn api_router(state: SharedState) -> Router {
    Router::new()
        .route("/tips", get(tips::list_tips))
        .route("/tips/generate", post(tips::generate_tips))
        .route("/meal-plans", get(meal_plans::get_meal_plan))
        .route("/meal-plans/generate", post(meal_plans::generate_meal_plan))
        .route(
            "/receipts/scan",
            post(receipts::scan_receipt).layer(DefaultBodyLimit::max(RECEIPT_BODY_LIMIT)),
        )
        .route("/token-usage", get(token_usage::list_token_usage))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ))
        .with_state(state)
}

/// Decode an optional JSON body. A blank body yields the default value.
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request("payload inválido").with_details(e))
}

fn parse_or<T: std::str::FromStr>(raw: Option<&str>, default: T) -> T {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Count the generation in metrics and, when the model billed tokens, append
/// a ledger entry. Returns the entry's cost once it is stored.
///
/// Ledger failures never fail the request.
async fn track<T>(
    state: &AppState,
    user_id: Uuid,
    request_type: RequestType,
    advice: &Advice<T>,
    metadata: Value,
) -> Option<i64> {
    state.metrics.observe_generation(request_type, &advice.source);
    let counts = advice.usage?;

    let metadata = match metadata {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let usage = NewTokenUsage::new(user_id, request_type, counts, &state.rates, metadata);
    state
        .metrics
        .observe_usage(request_type, counts, usage.cost_in_cents);

    match tokio::time::timeout(LEDGER_TIMEOUT, state.store.record_usage(&usage)).await {
        Ok(Ok(id)) => {
            debug!(
                "Recorded {} tokens ({} cents) for {} as {}",
                counts.total,
                usage.cost_in_cents,
                request_type,
                id
            );
            Some(usage.cost_in_cents)
        }
        Ok(Err(e)) => {
            state.metrics.ledger_failures.inc();
            warn!("Failed to record token usage for {}: {}", request_type, e);
            None
        }
        Err(_) => {
            state.metrics.ledger_failures.inc();
            warn!("Timed out recording token usage for {}", request_type);
            None
        }
    }
}
