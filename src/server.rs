//! HTTP API over the query facade.
//!
//! Thin formatting shim: every handler parses its inputs, calls one
//! `PulseService` or `SyncEngine` method, and serializes the result.
//! Protected routes require the static `X-API-Key` shared secret; an
//! unconfigured key rejects everything with 503 rather than serving open.

use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::db::DbError;
use crate::service::PulseService;
use crate::sync::SyncEngine;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PulseService>,
    pub engine: Arc<SyncEngine>,
    pub api_key: Option<String>,
}

/// Build the complete HTTP application: a public health probe plus the
/// key-protected query and refresh routes.
pub fn build_app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/daily-checkins", get(daily_checkins))
        .route("/api/absentees", get(absentees))
        .route("/api/checkin", get(user_checkin))
        .route("/api/summary/day", get(summary_day))
        .route("/api/summary/week", get(summary_week))
        .route("/api/summary/month", get(summary_month))
        .route("/api/refresh", post(refresh))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/healthz", get(healthcheck))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// =============================================================================
// Auth + error mapping
// =============================================================================

async fn require_api_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return ApiError::Unavailable("API key is not configured".to_string()).into_response();
    };
    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    match provided {
        Some(key) if key == expected => next.run(req).await,
        _ => ApiError::Unauthorized("Invalid API key".to_string()).into_response(),
    }
}

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        log::error!("Query failed: {e}");
        ApiError::Internal("query failed".to_string())
    }
}

/// Parse an optional `YYYY-MM-DD` query parameter, defaulting to today
/// (UTC). Malformed input is rejected here, before reaching the core.
fn parse_date_param(raw: Option<&str>) -> Result<NaiveDate, ApiError> {
    match raw {
        None => Ok(Utc::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
            ApiError::BadRequest("Invalid date format. Use YYYY-MM-DD.".to_string())
        }),
    }
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckinQuery {
    user: String,
    date: String,
}

async fn healthcheck() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn daily_checkins(
    State(state): State<AppState>,
    Query(params): Query<DateQuery>,
) -> Result<Response, ApiError> {
    let date = parse_date_param(params.date.as_deref())?;
    Ok(Json(state.service.daily_checkins(date)?).into_response())
}

async fn absentees(
    State(state): State<AppState>,
    Query(params): Query<DateQuery>,
) -> Result<Response, ApiError> {
    let date = parse_date_param(params.date.as_deref())?;
    Ok(Json(state.service.absentees(date)?).into_response())
}

async fn user_checkin(
    State(state): State<AppState>,
    Query(params): Query<CheckinQuery>,
) -> Result<Response, ApiError> {
    let date = parse_date_param(Some(&params.date))?;
    match state.service.user_checkin(&params.user, date)? {
        Some(checkin) => Ok(Json(checkin).into_response()),
        None => Err(ApiError::NotFound("Check-in not found".to_string())),
    }
}

async fn summary_day(
    State(state): State<AppState>,
    Query(params): Query<DateQuery>,
) -> Result<Response, ApiError> {
    let date = parse_date_param(params.date.as_deref())?;
    Ok(Json(state.service.daily_summary(date)?).into_response())
}

async fn summary_week(
    State(state): State<AppState>,
    Query(params): Query<DateQuery>,
) -> Result<Response, ApiError> {
    let date = parse_date_param(params.date.as_deref())?;
    Ok(Json(state.service.weekly_summary(date)?).into_response())
}

async fn summary_month(
    State(state): State<AppState>,
    Query(params): Query<DateQuery>,
) -> Result<Response, ApiError> {
    let date = parse_date_param(params.date.as_deref())?;
    Ok(Json(state.service.monthly_summary(date)?).into_response())
}

async fn refresh(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.engine.sync_recent(1).await.map_err(|e| {
        log::error!("Manual refresh failed: {e}");
        ApiError::Internal(format!("sync failed: {e}"))
    })?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db_with_path;
    use crate::db::PulseDb;
    use crate::sync::SyncOptions;
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use tower::ServiceExt;

    fn test_app(api_key: Option<&str>) -> (PulseDb, Router) {
        let (db, path) = test_db_with_path();
        let state = AppState {
            service: Arc::new(PulseService::new(path.clone())),
            engine: Arc::new(SyncEngine::new(path, None, SyncOptions::default())),
            api_key: api_key.map(|k| k.to_string()),
        };
        (db, build_app(state))
    }

    fn get_req(uri: &str, key: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri(uri);
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }
        builder.body(Body::empty()).expect("request")
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn test_healthz_needs_no_key() {
        let (_db, app) = test_app(Some("secret"));
        let response = app
            .oneshot(get_req("/healthz", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_key_is_unauthorized() {
        let (_db, app) = test_app(Some("secret"));
        let response = app
            .oneshot(get_req("/api/summary/day", None))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_key_is_unauthorized() {
        let (_db, app) = test_app(Some("secret"));
        let response = app
            .oneshot(get_req("/api/summary/day", Some("nope")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unconfigured_key_is_unavailable() {
        let (_db, app) = test_app(None);
        let response = app
            .oneshot(get_req("/api/summary/day", Some("anything")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_summary_day_empty_store() {
        let (_db, app) = test_app(Some("secret"));
        let response = app
            .oneshot(get_req("/api/summary/day?date=2024-06-03", Some("secret")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["totalCheckins"], 0);
        assert_eq!(body["goodPercent"], 0.0);
    }

    #[tokio::test]
    async fn test_malformed_date_is_bad_request() {
        let (_db, app) = test_app(Some("secret"));
        let response = app
            .oneshot(get_req("/api/absentees?date=03-06-2024", Some("secret")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_checkin_is_not_found() {
        let (_db, app) = test_app(Some("secret"));
        let response = app
            .oneshot(get_req(
                "/api/checkin?user=U404&date=2024-06-03",
                Some("secret"),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Check-in not found");
    }

    #[tokio::test]
    async fn test_refresh_with_disabled_sync_is_no_content() {
        let (_db, app) = test_app(Some("secret"));
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/api/refresh")
            .header("x-api-key", "secret")
            .body(Body::empty())
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_absentees_empty_is_ok() {
        let (_db, app) = test_app(Some("secret"));
        let response = app
            .oneshot(get_req("/api/absentees?date=2024-06-03", Some("secret")))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body.as_array().expect("array").is_empty());
    }
}
