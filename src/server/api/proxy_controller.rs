// gate -> single upstream fetch -> rewrite or passthrough, nothing is kept between requests
use axum::{
    Router,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use metrics::counter;
use tracing::{debug, error};
use url::Url;

use crate::server::{
    error::{AppResult, Error},
    extractors::{ProxyContext, ProxyRequest},
    services::{
        GateDecision, ProxyServices,
        upstream_services::{UpstreamRequest, UpstreamResponse},
    },
    utils::{
        encoding_utils::ContentEncoding,
        playlist_utils::{
            PLAYLIST_CONTENT_TYPE, PROXY_PATH, ResponseKind, classify, rewrite_playlist,
        },
    },
};

pub const REQUESTS_COUNTER: &str = "hls_proxy_requests_total";

/// upstream headers that make it through on passthrough responses, everything else is dropped
const PASSTHROUGH_HEADERS: [HeaderName; 7] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
    header::ACCEPT_RANGES,
    header::CACHE_CONTROL,
    header::ETAG,
    header::LAST_MODIFIED,
];

pub struct ProxyController;

impl ProxyController {
    pub fn app() -> Router {
        // HEAD comes for free with get
        Router::new().route(PROXY_PATH, get(Self::proxy).options(Self::proxy))
    }

    async fn proxy(ProxyContext(request, services): ProxyContext) -> AppResult<Response> {
        Self::handle(&request, &services).await.inspect_err(|e| {
            debug!("Proxy request failed ({}): {}", e.outcome(), e);
            counter!(REQUESTS_COUNTER, "outcome" => e.outcome()).increment(1);
        })
    }

    async fn handle(request: &ProxyRequest, services: &ProxyServices) -> AppResult<Response> {
        // nothing below this line runs unless the gate is happy
        let target = match services.policy.authorize(request)? {
            GateDecision::Preflight => {
                counter!(REQUESTS_COUNTER, "outcome" => "preflight").increment(1);
                return Ok(StatusCode::NO_CONTENT.into_response());
            }
            GateDecision::Proceed(target) => target,
        };

        debug!("Proxying: {}", target);

        let upstream = services
            .upstream
            .fetch(UpstreamRequest {
                url: target.clone(),
                range: request.range.clone(),
                user_agent: request
                    .user_agent
                    .clone()
                    .unwrap_or_else(|| services.default_user_agent.clone()),
            })
            .await?;

        // surfaced as is, the player decides what to do with a 404 segment
        if !upstream.status.is_success() {
            error!(
                "Response from target not successful: {} ({})",
                upstream.status, target
            );
            return Err(Error::UpstreamStatus(upstream.status));
        }

        let content_type = upstream.header_str(header::CONTENT_TYPE);
        let kind = classify(content_type, &target);
        debug!("Content-Type: {:?}, classified as {:?}", content_type, kind);

        match kind {
            ResponseKind::Playlist => {
                let response = Self::playlist_response(request, &target, upstream).await?;
                counter!(REQUESTS_COUNTER, "outcome" => "playlist").increment(1);
                Ok(response)
            }
            ResponseKind::Opaque => {
                counter!(REQUESTS_COUNTER, "outcome" => "passthrough").increment(1);
                Ok(Self::passthrough_response(upstream))
            }
        }
    }

    async fn playlist_response(
        request: &ProxyRequest,
        target: &Url,
        upstream: UpstreamResponse,
    ) -> AppResult<Response> {
        let cache_control = upstream.headers.get(header::CACHE_CONTROL).cloned();

        // playlists are small and have to be read whole to rewrite them line by line
        let bytes = upstream.bytes().await?;
        let decoded = String::from_utf8_lossy(&bytes);
        let text = decoded.strip_prefix('\u{feff}').unwrap_or(&*decoded);
        debug!("M3U8 text length: {} chars", text.len());

        let processed_body = rewrite_playlist(text, target, &request.base_origin);
        debug!(
            "Processed M3U8, response length: {} bytes",
            processed_body.len()
        );

        Self::build_m3u8_response(
            &processed_body,
            request.accept_encoding.as_deref(),
            cache_control,
        )
    }

    /// build m3u8 response with proper headers and optional compression
    fn build_m3u8_response(
        processed_body: &str,
        accept_encoding: Option<&str>,
        cache_control: Option<HeaderValue>,
    ) -> AppResult<Response> {
        let encoding = ContentEncoding::from_accept_encoding(accept_encoding);

        let mut response_headers = HeaderMap::new();
        response_headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PLAYLIST_CONTENT_TYPE),
        );
        response_headers.insert(header::VARY, HeaderValue::from_static("accept-encoding"));
        if let Some(cache_control) = cache_control {
            response_headers.insert(header::CACHE_CONTROL, cache_control);
        }

        let response_body = encoding.compress(processed_body.as_bytes()).map_err(|e| {
            error!("Failed to compress response with {:?}: {}", encoding, e);
            Error::InternalServerErrorWithContext("Failed to compress response".to_string())
        })?;

        if let Some(enc_header) = encoding.as_header_value() {
            debug!(
                "Compressed M3U8 with {:?} from {} to {} bytes",
                encoding,
                processed_body.len(),
                response_body.len()
            );
            response_headers.insert(
                header::CONTENT_ENCODING,
                HeaderValue::from_static(enc_header),
            );
        }

        response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(response_body.len()));

        Ok((StatusCode::OK, response_headers, response_body).into_response())
    }

    /// status (206 included) and the allow listed headers go through untouched, the body is
    /// streamed so big segments are never held in memory
    fn passthrough_response(upstream: UpstreamResponse) -> Response {
        let mut response_headers = HeaderMap::new();
        for name in PASSTHROUGH_HEADERS {
            if let Some(value) = upstream.headers.get(&name) {
                response_headers.insert(name, value.clone());
            }
        }

        let status = upstream.status;
        debug!("Passing through {} with {:?}", status, response_headers);

        (status, response_headers, upstream.into_body()).into_response()
    }
}
