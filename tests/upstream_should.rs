// these go through the real reqwest client against a throwaway axum server on loopback
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use hls_proxy::server::services::ProxyServices;
use hls_proxy::{AppConfig, ApplicationServer};
use tokio::net::TcpListener;
use tower::ServiceExt;

const SEGMENT: &[u8] = b"\x47\x40\x00\x10abcdefgh";
const PLAYLIST: &str = "#EXTM3U\n#EXTINF:4.0,\nseg0.ts\n";

async fn segment(headers: HeaderMap) -> Response {
    // just enough of bytes=a-b for the tests
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("bytes="))
        .and_then(|v| v.split_once('-'))
        .and_then(|(a, b)| Some((a.parse::<usize>().ok()?, b.parse::<usize>().ok()?)));

    match range {
        Some((start, end)) => (
            StatusCode::PARTIAL_CONTENT,
            [
                (header::CONTENT_TYPE, "video/mp2t".to_string()),
                (header::ACCEPT_RANGES, "bytes".to_string()),
                (
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", start, end, SEGMENT.len()),
                ),
            ],
            SEGMENT[start..=end].to_vec(),
        )
            .into_response(),
        None => (
            [(header::CONTENT_TYPE, "video/mp2t")],
            SEGMENT.to_vec(),
        )
            .into_response(),
    }
}

async fn echo_user_agent(headers: HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none")
        .to_string()
}

async fn spawn_upstream() -> SocketAddr {
    let app = Router::new()
        .route(
            "/live/index.m3u8",
            get(|| async { ([(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")], PLAYLIST) }),
        )
        .route(
            "/live/old.m3u8",
            get(|| async { Redirect::temporary("/live/index.m3u8") }),
        )
        .route("/live/seg0.ts", get(segment))
        .route("/ua", get(echo_user_agent))
        .route("/gone.ts", get(|| async { StatusCode::GONE }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn proxy() -> Router {
    let services = ProxyServices::new(Arc::new(AppConfig::default())).unwrap();
    ApplicationServer::router(services)
}

fn proxy_req(target: &str) -> axum::http::request::Builder {
    Request::builder()
        .uri(format!("/proxy?url={}", urlencoding::encode(target)))
        .header(header::HOST, "proxy.test")
}

async fn body_bytes(resp: Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[tokio::test]
async fn test_range_is_forwarded_and_206_comes_back() {
    let addr = spawn_upstream().await;

    let req = proxy_req(&format!("http://{}/live/seg0.ts", addr))
        .header(header::RANGE, "bytes=2-5")
        .body(Body::empty())
        .unwrap();
    let resp = proxy().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes 2-5/12");
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "video/mp2t");
    assert_eq!(body_bytes(resp).await, &SEGMENT[2..=5]);
}

#[tokio::test]
async fn test_full_segment_is_streamed_unchanged() {
    let addr = spawn_upstream().await;

    let req = proxy_req(&format!("http://{}/live/seg0.ts", addr))
        .body(Body::empty())
        .unwrap();
    let resp = proxy().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_LENGTH], "12");
    assert_eq!(body_bytes(resp).await, SEGMENT);
}

#[tokio::test]
async fn test_playlist_comes_back_rewritten() {
    let addr = spawn_upstream().await;

    let req = proxy_req(&format!("http://{}/live/index.m3u8", addr))
        .body(Body::empty())
        .unwrap();
    let resp = proxy().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8(body_bytes(resp).await).unwrap();
    let expected_segment = urlencoding::encode(&format!("http://{}/live/seg0.ts", addr)).into_owned();
    assert_eq!(
        body,
        format!(
            "#EXTM3U\n#EXTINF:4.0,\nhttp://proxy.test/proxy?url={}\n",
            expected_segment
        )
    );
}

#[tokio::test]
async fn test_redirects_are_followed() {
    let addr = spawn_upstream().await;

    let req = proxy_req(&format!("http://{}/live/old.m3u8", addr))
        .body(Body::empty())
        .unwrap();
    let resp = proxy().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(body.starts_with("#EXTM3U\n#EXTINF:4.0,\nhttp://proxy.test/proxy?url="));
}

#[tokio::test]
async fn test_caller_user_agent_is_forwarded() {
    let addr = spawn_upstream().await;

    let req = proxy_req(&format!("http://{}/ua", addr))
        .header(header::USER_AGENT, "AppleCoreMedia/1.0")
        .body(Body::empty())
        .unwrap();
    let resp = proxy().oneshot(req).await.unwrap();

    assert_eq!(body_bytes(resp).await, b"AppleCoreMedia/1.0");
}

#[tokio::test]
async fn test_upstream_status_is_surfaced() {
    let addr = spawn_upstream().await;

    let req = proxy_req(&format!("http://{}/gone.ts", addr))
        .body(Body::empty())
        .unwrap();
    let resp = proxy().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::GONE);
}

#[tokio::test]
async fn test_refused_connection_is_502() {
    // grab a free port and close it again so nothing is listening there
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let req = proxy_req(&format!("http://{}/live/seg0.ts", addr))
        .body(Body::empty())
        .unwrap();
    let resp = proxy().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(resp.headers().get(header::CONTENT_RANGE).is_none());
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
