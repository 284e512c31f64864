pub mod api;
pub mod dtos;
pub mod error;
pub mod extractors;
pub mod services;
pub mod utils;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::http::HeaderValue;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_EXPOSE_HEADERS,
};
use axum::{Extension, Router, routing::get};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AppConfig;
use api::{health_controller::health_endpoint, proxy_controller::ProxyController};
use services::ProxyServices;

pub use api::*;
pub use error::{AppResult, Error};

pub const CORS_ALLOW_HEADERS: &str =
    "Range, Origin, Accept, X-Requested-With, Content-Type, Authorization, X-Proxy-Token";
pub const CORS_EXPOSE_HEADERS: &str = "Content-Length, Content-Range, Accept-Ranges";
pub const CORS_ALLOW_METHODS: &str = "GET,HEAD,OPTIONS";

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

pub fn get_uptime_seconds() -> u64 {
    START_TIME.elapsed().as_secs()
}

pub fn get_app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub struct ApplicationServer;

impl ApplicationServer {
    /// every route, with the services extension and the CORS headers players need on every
    /// response (rejections too, otherwise browsers hide the status from the player)
    pub fn router(services: ProxyServices) -> Router {
        Lazy::force(&START_TIME);

        Router::new()
            .merge(ProxyController::app())
            .route("/health", get(health_endpoint))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(SetResponseHeaderLayer::overriding(
                        ACCESS_CONTROL_ALLOW_ORIGIN,
                        HeaderValue::from_static("*"),
                    ))
                    .layer(SetResponseHeaderLayer::overriding(
                        ACCESS_CONTROL_ALLOW_HEADERS,
                        HeaderValue::from_static(CORS_ALLOW_HEADERS),
                    ))
                    .layer(SetResponseHeaderLayer::overriding(
                        ACCESS_CONTROL_EXPOSE_HEADERS,
                        HeaderValue::from_static(CORS_EXPOSE_HEADERS),
                    ))
                    .layer(SetResponseHeaderLayer::overriding(
                        ACCESS_CONTROL_ALLOW_METHODS,
                        HeaderValue::from_static(CORS_ALLOW_METHODS),
                    ))
                    .layer(Extension(services)),
            )
    }

    pub async fn serve(config: Arc<AppConfig>) -> anyhow::Result<()> {
        let services =
            ProxyServices::new(config.clone()).context("failed to build proxy services")?;

        let mut router = Self::router(services);

        if !config.disable_metrics {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .context("failed to install prometheus recorder")?;
            router = router.route(
                "/metrics",
                get(move || std::future::ready(handle.render())),
            );
            info!("metrics exposed on /metrics");
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        info!("proxy listening on {}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")?;

        info!("proxy shut down");

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
}
