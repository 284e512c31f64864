use axum::Extension;
use axum::extract::{FromRequestParts, Query};
use axum::http::header::{ACCEPT_ENCODING, HOST, RANGE, USER_AGENT};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Method};
use serde::Deserialize;
use tracing::debug;

use crate::server::error::Error;
use crate::server::services::ProxyServices;

pub const TOKEN_HEADER: &str = "x-proxy-token";

#[derive(Deserialize, Default)]
struct ProxyQuery {
    url: Option<String>,
    token: Option<String>,
}

/// one inbound proxy call, nothing here has been validated yet
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// raw (already percent decoded) `url` query parameter
    pub target: Option<String>,
    /// x-proxy-token header, falling back to ?token=
    pub token: Option<String>,
    pub range: Option<HeaderValue>,
    pub user_agent: Option<HeaderValue>,
    pub accept_encoding: Option<String>,
    /// origin written into rewritten playlists, e.g. https://proxy.example.com
    pub base_origin: String,
}

impl ProxyRequest {
    /// bare GET, mostly useful in tests
    pub fn get(target: Option<&str>, base_origin: &str) -> Self {
        Self {
            method: Method::GET,
            target: target.map(str::to_string),
            token: None,
            range: None,
            user_agent: None,
            accept_encoding: None,
            base_origin: base_origin.to_string(),
        }
    }
}

pub struct ProxyContext(pub ProxyRequest, pub ProxyServices);

/// builds the origin players will come back to, the configured PUBLIC_BASE_URL wins, otherwise
/// it's x-forwarded-proto (first hop) + Host like most reverse proxies expect
pub fn base_origin(parts: &Parts, public_base_url: Option<String>) -> String {
    if let Some(base) = public_base_url {
        return base;
    }

    let proto = parts
        .headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| s == "http" || s == "https")
        .unwrap_or_else(|| "http".to_string());

    let host = parts
        .headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .unwrap_or_else(|| "localhost".to_string());

    format!("{}://{}", proto, host)
}

impl<S> FromRequestParts<S> for ProxyContext
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(services): Extension<ProxyServices> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|err| Error::InternalServerErrorWithContext(err.to_string()))?;

        // a query that doesn't deserialize is treated like one without the parameters, the gate
        // turns that into a missing parameter
        let Query(query): Query<ProxyQuery> = Query::from_request_parts(parts, state)
            .await
            .unwrap_or(Query(ProxyQuery::default()));

        let token = parts
            .headers
            .get(TOKEN_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string())
            .or(query.token);

        let request = ProxyRequest {
            method: parts.method.clone(),
            target: query.url,
            token,
            range: parts.headers.get(RANGE).cloned(),
            user_agent: parts.headers.get(USER_AGENT).cloned(),
            accept_encoding: parts
                .headers
                .get(ACCEPT_ENCODING)
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string()),
            base_origin: base_origin(parts, services.config.public_base_url()),
        };

        debug!(
            "{} proxy request for {:?} (range: {:?})",
            request.method, request.target, request.range
        );

        Ok(ProxyContext(request, services))
    }
}
