//! Rule configuration endpoints. The structured routes speak the
//! [`RuleSet`] JSON form; the `/xml` routes carry the raw engine
//! document for older clients that manage it themselves.

use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use linthub_model::{ActiveRules, RuleSet, RuleSetPatch};

use crate::infra::{app_state::AppState, errors::AppResult};

/// `GET /api/checkstyle/configuration`: the active rules, materializing
/// the default document on first access.
pub async fn get_configuration(
    State(state): State<AppState>,
) -> AppResult<Json<ActiveRules>> {
    Ok(Json(state.rules.active().await?))
}

/// `PATCH /api/checkstyle/configuration`: merge a partial update over
/// the active rules. An empty patch returns the current state untouched.
pub async fn patch_configuration(
    State(state): State<AppState>,
    Json(patch): Json<RuleSetPatch>,
) -> AppResult<Json<ActiveRules>> {
    Ok(Json(state.rules.merge_patch(patch).await?))
}

/// `PUT /api/checkstyle/configuration`: replace the active rules.
/// Fields absent from the body deserialize to their defaults.
pub async fn put_configuration(
    State(state): State<AppState>,
    Json(rules): Json<RuleSet>,
) -> AppResult<Json<ActiveRules>> {
    Ok(Json(state.rules.update_rules(rules).await?))
}

/// `POST /api/checkstyle/configuration/reset`: rebuild the default
/// document in place, keeping the stored row.
pub async fn reset_configuration(
    State(state): State<AppState>,
) -> AppResult<Json<ActiveRules>> {
    Ok(Json(state.rules.reset().await?))
}

/// `GET /api/checkstyle/configuration/xml`: the active document as it
/// will be handed to the engine.
pub async fn get_configuration_xml(
    State(state): State<AppState>,
) -> AppResult<Response> {
    let xml = state.rules.active_xml().await?;
    Ok((
        [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
        xml,
    )
        .into_response())
}

/// `POST /api/checkstyle/configuration/xml`: store a raw document
/// verbatim. The body is parsed first; malformed XML is rejected with
/// 400 and the stored document stays untouched.
pub async fn post_configuration_xml(
    State(state): State<AppState>,
    body: String,
) -> AppResult<Json<ActiveRules>> {
    Ok(Json(state.rules.set_active_xml(&body).await?))
}
