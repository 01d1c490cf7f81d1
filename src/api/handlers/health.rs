//! Health check endpoints.
//!
//! Liveness plus component-level views: database connectivity, provider
//! circuits and the enhancement layer.

use std::collections::HashMap;

use axum::{Json, extract::State};
use diesel_async::RunQueryDsl;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::doc::HEALTH_TAG;
use crate::enhancement::EnhancementHealthReport;
use crate::providers::ProviderHealthReport;
use crate::state::EngineState;

/// Health status of the service or a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health status of an individual component.
#[derive(Debug, Serialize, ToSchema)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub timestamp: String,
    pub checks: HashMap<String, ComponentHealth>,
}

pub fn routes() -> OpenApiRouter<EngineState> {
    OpenApiRouter::new()
        .routes(routes!(health_check))
        .routes(routes!(provider_health))
        .routes(routes!(enhancement_health))
}

/// Liveness check with a database connectivity probe.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
    tag = HEALTH_TAG
)]
pub async fn health_check(
    State(state): State<EngineState>,
) -> (axum::http::StatusCode, Json<HealthResponse>) {
    let mut checks = HashMap::new();

    let database = check_database(&state).await;
    let overall = database.status;
    checks.insert("database".to_string(), database);

    let status_code = match overall {
        HealthStatus::Healthy | HealthStatus::Degraded => axum::http::StatusCode::OK,
        HealthStatus::Unhealthy => axum::http::StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        status_code,
        Json(HealthResponse {
            status: overall,
            version: env!("CARGO_PKG_VERSION"),
            timestamp: chrono::Utc::now().to_rfc3339(),
            checks,
        }),
    )
}

/// Circuit and latency snapshots for every registered provider.
#[utoipa::path(
    get,
    path = "/health/providers",
    responses(
        (status = 200, description = "Provider health snapshots", body = [ProviderHealthReport]),
    ),
    tag = HEALTH_TAG
)]
pub async fn provider_health(
    State(state): State<EngineState>,
) -> Json<Vec<ProviderHealthReport>> {
    state.providers.refresh_health();
    Json(state.providers.health_report())
}

/// Enhancement layer counters and feature toggles.
#[utoipa::path(
    get,
    path = "/health/enhancements",
    responses(
        (status = 200, description = "Enhancement layer report", body = EnhancementHealthReport),
    ),
    tag = HEALTH_TAG
)]
pub async fn enhancement_health(
    State(state): State<EngineState>,
) -> Json<EnhancementHealthReport> {
    Json(state.enhancement.health_report().await)
}

async fn check_database(state: &EngineState) -> ComponentHealth {
    match state.db_pool.get().await {
        Ok(mut conn) => match diesel::sql_query("SELECT 1").execute(&mut conn).await {
            Ok(_) => ComponentHealth {
                status: HealthStatus::Healthy,
                message: None,
            },
            Err(e) => ComponentHealth {
                status: HealthStatus::Unhealthy,
                message: Some(format!("Query failed: {e}")),
            },
        },
        Err(e) => ComponentHealth {
            status: HealthStatus::Unhealthy,
            message: Some(format!("Connection failed: {e}")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test]
    fn component_health_omits_empty_message() {
        let healthy = ComponentHealth {
            status: HealthStatus::Healthy,
            message: None,
        };
        let json = serde_json::to_value(&healthy).unwrap();
        assert!(json.get("message").is_none());
    }
}
