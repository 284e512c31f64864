use axum::http::{Method, StatusCode};
use hls_proxy::server::error::Error;
use hls_proxy::server::extractors::ProxyRequest;
use hls_proxy::server::services::{AccessPolicy, GateDecision};
use hls_proxy::AppConfig;

const BASE: &str = "http://localhost:5000";

fn request(url: Option<&str>, token: Option<&str>) -> ProxyRequest {
    let mut request = ProxyRequest::get(url, BASE);
    request.token = token.map(str::to_string);
    request
}

#[test]
fn test_options_is_answered_before_any_check() {
    let policy = AccessPolicy::new(["cdn.example.com"], Some("secret".to_string()));
    let mut preflight = request(None, None);
    preflight.method = Method::OPTIONS;

    assert_eq!(policy.authorize(&preflight).unwrap(), GateDecision::Preflight);
}

#[test]
fn test_missing_or_empty_url_is_rejected() {
    let policy = AccessPolicy::default();

    let missing = policy.authorize(&request(None, None)).unwrap_err();
    let empty = policy.authorize(&request(Some(""), None)).unwrap_err();

    assert!(matches!(missing, Error::MissingParameter("url")));
    assert!(matches!(empty, Error::MissingParameter("url")));
    assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);
}

#[test]
fn test_unparseable_urls_are_rejected() {
    let policy = AccessPolicy::default();

    for bad in ["not a url", "/live/index.m3u8", "ftp://cdn.example.com/a.ts", "https://"] {
        let err = policy.authorize(&request(Some(bad), None)).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)), "{} should be invalid", bad);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}

#[test]
fn test_empty_policy_lets_everything_through() {
    let policy = AccessPolicy::new(Vec::<String>::new(), None);

    let decision = policy
        .authorize(&request(Some("https://anything.example.net/x.m3u8"), None))
        .unwrap();

    assert_eq!(
        decision,
        GateDecision::Proceed("https://anything.example.net/x.m3u8".parse().unwrap())
    );
    assert!(policy.allows_all_hosts());
    assert!(!policy.requires_token());
}

#[test]
fn test_host_outside_allow_list_is_forbidden() {
    let policy = AccessPolicy::new(["cdn.example.com"], None);

    let err = policy
        .authorize(&request(Some("https://evil.example.com/x.m3u8"), None))
        .unwrap_err();

    assert!(matches!(err, Error::HostNotAllowed(ref host) if host == "evil.example.com"));
    assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
}

#[test]
fn test_allow_list_ignores_case_and_blanks() {
    let policy = AccessPolicy::new([" CDN.Example.com ", ""], None);

    assert!(
        policy
            .authorize(&request(Some("https://cdn.EXAMPLE.com/live/index.m3u8"), None))
            .is_ok()
    );
    assert!(!policy.allows_all_hosts());
}

#[test]
fn test_token_is_required_when_configured() {
    let policy = AccessPolicy::new(Vec::<String>::new(), Some("secret".to_string()));
    let url = Some("https://cdn.example.com/live/index.m3u8");

    let missing = policy.authorize(&request(url, None)).unwrap_err();
    let wrong = policy.authorize(&request(url, Some("secreT"))).unwrap_err();
    let longer = policy.authorize(&request(url, Some("secret2"))).unwrap_err();

    assert!(matches!(missing, Error::Unauthorized));
    assert!(matches!(wrong, Error::Unauthorized));
    assert!(matches!(longer, Error::Unauthorized));
    assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);

    assert!(policy.authorize(&request(url, Some("secret"))).is_ok());
}

#[test]
fn test_host_check_runs_before_token_check() {
    let policy = AccessPolicy::new(["cdn.example.com"], Some("secret".to_string()));

    let err = policy
        .authorize(&request(Some("https://evil.example.com/x.m3u8"), None))
        .unwrap_err();

    assert!(matches!(err, Error::HostNotAllowed(_)));
}

#[test]
fn test_policy_from_config_treats_empty_values_as_unset() {
    let config = AppConfig {
        allowed_hosts: vec!["".to_string()],
        auth_token: Some("".to_string()),
        ..AppConfig::default()
    };

    let policy = AccessPolicy::from_config(&config);

    assert!(policy.allows_all_hosts());
    assert!(!policy.requires_token());
}
