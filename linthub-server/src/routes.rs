//! Router assembly. `create_app` produces the complete service the
//! binary serves; tests build the same router over in-memory state.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    routing::{get, post},
};
use linthub_config::CorsConfig;
use serde_json::{Value, json};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::handlers::{jobs, logs_ws, rules};
use crate::infra::app_state::AppState;

/// The full application: liveness endpoints, the JSON API under `/api`
/// and the WebSocket log stream, wrapped in CORS and request tracing.
pub fn create_app(state: AppState) -> Router {
    let cors_layer = build_cors_layer(&state.config.cors);

    Router::new()
        .route("/ping", get(ping_handler))
        .route("/health", get(health_handler))
        .merge(create_api_router())
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The API surface without the outer middleware stack.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/api", api_routes())
        .route("/ws/logs/{id}", get(logs_ws::job_events_handler))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(jobs::submit_analysis))
        .route("/status/{id}", get(jobs::job_status))
        .route("/results/{id}", get(jobs::job_results))
        .route("/logs/{id}", get(jobs::job_logs))
        .route(
            "/checkstyle/configuration",
            get(rules::get_configuration)
                .patch(rules::patch_configuration)
                .put(rules::put_configuration),
        )
        .route(
            "/checkstyle/configuration/reset",
            post(rules::reset_configuration),
        )
        .route(
            "/checkstyle/configuration/xml",
            get(rules::get_configuration_xml)
                .post(rules::post_configuration_xml),
        )
}

fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    if cors.is_wildcard_included() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH])
        .allow_headers(Any)
}

async fn ping_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "LintHub server is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<Value>, StatusCode> {
    let mut health = json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {}
    });

    // Any cheap read proves the job store is reachable.
    match state.orchestrator.job(Uuid::nil()).await {
        Ok(_) => {
            health["checks"]["database"] = json!({ "status": "healthy" });
            Ok(Json(health))
        }
        Err(e) => {
            health["checks"]["database"] = json!({
                "status": "unhealthy",
                "error": e.to_string()
            });
            health["status"] = json!("unhealthy");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
