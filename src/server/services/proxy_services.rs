use std::sync::Arc;

use axum::http::HeaderValue;
use tracing::{info, warn};

use crate::config::{AppConfig, DEFAULT_USER_AGENT};

use super::{
    access_services::AccessPolicy,
    upstream_services::{DynUpstreamService, ReqwestUpstreamService},
};

/// everything a proxy request needs, shared through an Extension and cloned per request
#[derive(Clone)]
pub struct ProxyServices {
    pub policy: Arc<AccessPolicy>,
    pub upstream: DynUpstreamService,
    pub default_user_agent: HeaderValue,
    pub config: Arc<AppConfig>,
}

impl ProxyServices {
    pub fn new(config: Arc<AppConfig>) -> anyhow::Result<Self> {
        info!("starting proxy services...");

        let upstream = Arc::new(ReqwestUpstreamService::new(&config)?) as DynUpstreamService;

        info!("upstream client ok");

        Ok(Self::with_upstream(config, upstream))
    }

    /// same as `new` but with the upstream swapped out, tests hand a mock in here
    pub fn with_upstream(config: Arc<AppConfig>, upstream: DynUpstreamService) -> Self {
        let policy = Arc::new(AccessPolicy::from_config(&config));

        let default_user_agent =
            HeaderValue::from_str(&config.upstream_user_agent).unwrap_or_else(|_| {
                warn!(
                    "UPSTREAM_USER_AGENT is not a valid header value, using {}",
                    DEFAULT_USER_AGENT
                );
                HeaderValue::from_static(DEFAULT_USER_AGENT)
            });

        Self {
            policy,
            upstream,
            default_user_agent,
            config,
        }
    }
}
