use std::collections::HashSet;

use axum::http::Method;
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::AppConfig,
    server::{
        error::{AppResult, Error},
        extractors::ProxyRequest,
    },
};

/// what the gate lets through
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// OPTIONS probe, answered with 204 and never fetched
    Preflight,
    /// validated and authorized upstream target
    Proceed(Url),
}

/// host allow list and shared token, built once from the config and never touched again
///
/// both checks are off when left empty which turns this into an open relay, anyone deploying it
/// publicly needs to set both
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    allowed_hosts: HashSet<String>,
    auth_token: Option<String>,
}

impl AccessPolicy {
    pub fn new<I, S>(allowed_hosts: I, auth_token: Option<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|h| h.as_ref().trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            auth_token: auth_token.filter(|t| !t.is_empty()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let policy = Self::new(config.allowed_hosts(), config.auth_token());

        if policy.allowed_hosts.is_empty() {
            warn!("ALLOWED_HOSTS is empty, the proxy will fetch from any host");
        }
        if policy.auth_token.is_none() {
            warn!("AUTH_TOKEN is not set, the proxy does not require a token");
        }

        policy
    }

    pub fn allows_all_hosts(&self) -> bool {
        self.allowed_hosts.is_empty()
    }

    pub fn requires_token(&self) -> bool {
        self.auth_token.is_some()
    }

    /// runs every check before anything touches the network, order matters because the status
    /// a caller sees depends on which check fails first
    pub fn authorize(&self, request: &ProxyRequest) -> AppResult<GateDecision> {
        if request.method == Method::OPTIONS {
            return Ok(GateDecision::Preflight);
        }

        let raw_url = request
            .target
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(Error::MissingParameter("url"))?;

        let target = parse_target(raw_url)?;

        if !self.allowed_hosts.is_empty() {
            let host = target.host_str().unwrap_or_default().to_ascii_lowercase();
            if !self.allowed_hosts.contains(&host) {
                debug!("Rejected host not in allow list: {}", host);
                return Err(Error::HostNotAllowed(host));
            }
        }

        if let Some(expected) = &self.auth_token {
            let supplied = request.token.as_deref().ok_or(Error::Unauthorized)?;
            if !tokens_match(supplied, expected) {
                debug!("Rejected request with wrong token");
                return Err(Error::Unauthorized);
            }
        }

        Ok(GateDecision::Proceed(target))
    }
}

/// absolute http(s) urls only, anything else can't be fetched anyway
pub fn parse_target(raw_url: &str) -> AppResult<Url> {
    let target = Url::parse(raw_url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    match target.scheme() {
        "http" | "https" => Ok(target),
        other => Err(Error::InvalidUrl(format!("unsupported scheme {}", other))),
    }
}

// xor fold, compare time doesn't depend on where the tokens differ
fn tokens_match(supplied: &str, expected: &str) -> bool {
    supplied.len() == expected.len()
        && supplied
            .as_bytes()
            .iter()
            .zip(expected.as_bytes().iter())
            .fold(0, |acc, (a, b)| acc | (a ^ b))
            == 0
}
