use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use mockall::automock;
use tracing::{debug, error};
use url::Url;

use crate::{
    config::AppConfig,
    server::error::{AppResult, Error},
};

pub type DynUpstreamService = Arc<dyn UpstreamServiceTrait + Send + Sync>;

pub type UpstreamBody = BoxStream<'static, AppResult<Bytes>>;

/// everything the pipeline sends upstream, one GET per request
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: Url,
    /// forwarded verbatim so segment seeking works
    pub range: Option<HeaderValue>,
    pub user_agent: HeaderValue,
}

pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: UpstreamBody,
}

impl UpstreamResponse {
    /// a response with the whole body already in memory
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self {
            status,
            headers,
            body: stream::once(async move { Ok(body) }).boxed(),
        }
    }

    pub fn header_str(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// buffers the whole body, only playlists go through here
    pub async fn bytes(self) -> AppResult<Vec<u8>> {
        self.body
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
    }

    /// hands the body stream to axum without reading it
    pub fn into_body(self) -> Body {
        Body::from_stream(self.body)
    }
}

#[automock]
#[async_trait]
pub trait UpstreamServiceTrait {
    /// single attempt, network failures come back as `Error::FetchFailure`
    async fn fetch(&self, request: UpstreamRequest) -> AppResult<UpstreamResponse>;
}

pub struct ReqwestUpstreamService {
    http: reqwest::Client,
}

impl ReqwestUpstreamService {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .connect_timeout(Duration::from_secs(config.upstream_connect_timeout_secs))
            .build()?;

        Ok(Self { http })
    }
}

#[async_trait]
impl UpstreamServiceTrait for ReqwestUpstreamService {
    async fn fetch(&self, request: UpstreamRequest) -> AppResult<UpstreamResponse> {
        let mut request_builder = self
            .http
            .get(request.url.clone())
            .header(header::USER_AGENT, request.user_agent);

        if let Some(range) = request.range {
            request_builder = request_builder.header(header::RANGE, range);
        }

        debug!("Sending request to {}", request.url);

        let response = request_builder.send().await.map_err(|e| {
            error!("Request to {} failed: {}", request.url, e);
            Error::FetchFailure(e.to_string())
        })?;

        debug!("Received response with status: {}", response.status());

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map_err(|e| {
                error!("Failed reading upstream body: {}", e);
                Error::FetchFailure(e.to_string())
            })
            .boxed();

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
