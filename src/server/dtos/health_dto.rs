use chrono::{DateTime, Utc};
use serde::Serialize;

/// what the access policy is enforcing, handy when checking a deploy isn't an open relay
#[derive(Debug, Serialize)]
pub struct AccessSummary {
    pub host_allow_list: bool,
    pub token_required: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub version: String,
    pub environment: String,
    pub access: AccessSummary,
}
