use axum::Extension;
use axum::Json;
use axum::http::StatusCode;
use chrono::Utc;

use crate::logger::environment_name;
use crate::server::dtos::health_dto::{AccessSummary, HealthResponse};
use crate::server::services::ProxyServices;
use crate::server::{get_app_version, get_uptime_seconds};

/// health endpoint, there's nothing stateful to check so if this answers the proxy is up
pub async fn health_endpoint(
    Extension(services): Extension<ProxyServices>,
) -> (StatusCode, Json<HealthResponse>) {
    let response = HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        uptime_seconds: get_uptime_seconds(),
        version: get_app_version().to_string(),
        environment: environment_name(services.config.cargo_env).to_string(),
        access: AccessSummary {
            host_allow_list: !services.policy.allows_all_hosts(),
            token_required: services.policy.requires_token(),
        },
    };

    (StatusCode::OK, Json(response))
}
