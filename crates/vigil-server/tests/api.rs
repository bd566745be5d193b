#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    routing::get as get_route,
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use vigil_server::{app_state::AppState, config::ServerConfig, router};

const TOKEN: &str = "s3cret";

fn test_config() -> ServerConfig {
    ServerConfig {
        admin_token: TOKEN.into(),
        ..ServerConfig::default()
    }
}

fn app_with(cfg: ServerConfig) -> (Router, AppState) {
    let state = AppState::new(cfg).expect("state must build");
    (router::build_router(state.clone()), state)
}

fn app() -> (Router, AppState) {
    app_with(test_config())
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.expect("router is infallible")
}

async fn get(app: &Router, uri: &str) -> Response {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: &Router, uri: &str, json: &str) -> Response {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_owned()))
            .unwrap(),
    )
    .await
}

async fn set_ready(app: &Router, state: &str, token: Option<&str>) -> Response {
    let mut req = Request::builder()
        .method("POST")
        .uri(format!("/admin/ready?state={state}"));
    if let Some(t) = token {
        req = req.header("x-admin-token", t);
    }
    send(app, req.body(Body::empty()).unwrap()).await
}

async fn body_text(res: Response) -> String {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(res: Response) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).expect("body must be json")
}

fn is_uuid(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    parts.iter().map(|p| p.len()).collect::<Vec<_>>() == [8, 4, 4, 4, 12]
        && parts.iter().all(|p| p.chars().all(|c| c.is_ascii_hexdigit()))
}

// --------------------
// Liveness / readiness
// --------------------

#[tokio::test]
async fn health_and_live_report_ok() {
    let (app, _) = app();
    for path in ["/health", "/live"] {
        let res = get(&app, path).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["status"], "ok");
    }
}

#[tokio::test]
async fn liveness_ignores_readiness() {
    let (app, _) = app();
    assert_eq!(set_ready(&app, "down", Some(TOKEN)).await.status(), StatusCode::OK);
    assert_eq!(get(&app, "/health").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn ready_round_trip_through_admin_switch() {
    let (app, _) = app();

    let res = get(&app, "/ready").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_text(res).await, "READY");

    for _ in 0..2 {
        let res = set_ready(&app, "down", Some(TOKEN)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["ready"], false);

        let res = get(&app, "/ready").await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_text(res).await, "NOT_READY");
    }

    let res = set_ready(&app, "up", Some(TOKEN)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["ready"], true);
    assert_eq!(get(&app, "/ready").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn bad_or_missing_token_is_unauthorized_and_inert() {
    let (app, state) = app();
    for token in [Some("wrong"), Some(""), None] {
        let res = set_ready(&app, "down", token).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(body_json(res).await["error"].is_string());
    }
    assert_eq!(get(&app, "/ready").await.status(), StatusCode::OK);
    assert!(state.readiness().query().is_up());
}

#[tokio::test]
async fn invalid_state_value_is_bad_request() {
    let (app, _) = app();
    let res = set_ready(&app, "sideways", Some(TOKEN)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["code"], "BAD_REQUEST");
    assert_eq!(get(&app, "/ready").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn token_is_checked_before_state_value() {
    let (app, _) = app();
    let res = set_ready(&app, "sideways", Some("wrong")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unparseable_query_with_bad_token_is_json_401() {
    let (app, state) = app();
    let req = |token: &str| {
        Request::builder()
            .method("POST")
            .uri("/admin/ready?state=up&state=down")
            .header("x-admin-token", token)
            .body(Body::empty())
            .unwrap()
    };

    let res = send(&app, req("wrong")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(res).await["code"], "UNAUTHORIZED");

    let res = send(&app, req(TOKEN)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert!(body["error"].is_string());
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(state.readiness().query().is_up());
}

#[tokio::test]
async fn boot_flag_down_starts_not_ready() {
    let (app, _) = app_with(ServerConfig {
        ready_flag: "down".into(),
        ..test_config()
    });
    assert_eq!(get(&app, "/ready").await.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(set_ready(&app, "up", Some(TOKEN)).await.status(), StatusCode::OK);
    assert_eq!(get(&app, "/ready").await.status(), StatusCode::OK);
}

// --------------------
// Request identity
// --------------------

#[tokio::test]
async fn request_id_is_generated_when_absent_or_empty() {
    let (app, _) = app();
    let res = get(&app, "/health").await;
    let id = res.headers()["x-request-id"].to_str().unwrap().to_owned();
    assert!(is_uuid(&id), "{id}");

    let res = send(
        &app,
        Request::builder().uri("/health").header("x-request-id", "").body(Body::empty()).unwrap(),
    )
    .await;
    let id2 = res.headers()["x-request-id"].to_str().unwrap().to_owned();
    assert!(is_uuid(&id2), "{id2}");
    assert_ne!(id, id2);
}

#[tokio::test]
async fn request_id_is_propagated_unchanged() {
    let (app, _) = app();
    let res = send(
        &app,
        Request::builder()
            .uri("/users")
            .header("x-request-id", "trace-abc-123")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.headers()["x-request-id"], "trace-abc-123");
}

#[tokio::test]
async fn error_responses_carry_request_id_too() {
    let (app, _) = app();
    let res = get(&app, "/nope").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(res.headers().contains_key("x-request-id"));
}

// --------------------
// Users
// --------------------

#[tokio::test]
async fn create_user_returns_201_with_id() {
    let (app, _) = app();
    let res = post_json(&app, "/users", r#"{"email":"a@b.com","name":"Emanuel"}"#).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = body_json(res).await;
    assert_eq!(body["email"], "a@b.com");
    assert_eq!(body["name"], "Emanuel");
    assert_eq!(body["id"], 1);

    let res = post_json(&app, "/users", r#"{"email":"c@d.org","name":"Ana"}"#).await;
    assert_eq!(body_json(res).await["id"], 2);

    let list = body_json(get(&app, "/users").await).await;
    assert_eq!(list["users"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn empty_payload_is_rejected_and_not_stored() {
    let (app, _) = app();
    let before = body_json(get(&app, "/users").await).await["users"].as_array().unwrap().len();

    let res = post_json(&app, "/users", "{}").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert!(body["error"].is_string());
    assert_eq!(body["code"], "VALIDATION_FAILED");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["email", "name"]);

    let after = body_json(get(&app, "/users").await).await["users"].as_array().unwrap().len();
    assert_eq!(before, after);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let (app, state) = app();
    let res = post_json(&app, "/users", "{not json").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["code"], "BAD_REQUEST");
    assert!(state.users().is_empty().unwrap());
}

// --------------------
// Errors
// --------------------

#[tokio::test]
async fn unknown_route_is_json_404_with_path() {
    let (app, _) = app();
    let res = get(&app, "/nope?x=1").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body = body_json(res).await;
    assert_eq!(body["error"], "Not Found");
    assert_eq!(body["path"], "/nope?x=1");
}

#[tokio::test]
async fn wrong_method_on_known_route_is_json_405() {
    let (app, _) = app();
    let cases = [("DELETE", "/users"), ("GET", "/admin/ready"), ("POST", "/health")];
    for (method, path) in cases {
        let req = Request::builder().method(method).uri(path).body(Body::empty()).unwrap();
        let res = send(&app, req).await;
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED, "{method} {path}");
        assert!(res.headers().contains_key("x-request-id"));
        let body = body_json(res).await;
        assert_eq!(body["error"], "Method Not Allowed");
        assert_eq!(body["code"], "METHOD_NOT_ALLOWED");
        assert_eq!(body["method"], method);
        assert_eq!(body["path"], path);
    }
}

async fn explode() -> &'static str {
    panic!("handler exploded")
}

#[tokio::test]
async fn panicking_handler_is_json_500_and_observed() {
    let state = AppState::new(test_config()).expect("state must build");
    let extra = Router::<AppState>::new().route("/boom", get_route(explode));
    let app = router::build_router_with(state.clone(), extra);

    let res = get(&app, "/boom").await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.headers().contains_key("x-request-id"));
    let body = body_json(res).await;
    assert_eq!(body["error"], "handler exploded");
    assert_eq!(body["code"], "INTERNAL");

    let h = &state.metrics().request_duration;
    assert_eq!(h.sample_count(&labels("GET", "/boom", "500")), 1);
    assert_eq!(h.total_count(), 1);
    assert_eq!(get(&app, "/health").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn panics_become_json_500() {
    let res = vigil_server::error::panic_response(Box::new("handler exploded"));
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(res).await;
    assert_eq!(body["error"], "handler exploded");
    assert_eq!(body["code"], "INTERNAL");
}

#[tokio::test]
async fn security_headers_are_set() {
    let (app, _) = app();
    let res = get(&app, "/health").await;
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert_eq!(res.headers()["x-frame-options"], "SAMEORIGIN");
}

// --------------------
// Metrics
// --------------------

fn labels<'a>(method: &'a str, route: &'a str, status: &'a str) -> [(&'a str, &'a str); 3] {
    [("method", method), ("route", route), ("status_code", status)]
}

#[tokio::test]
async fn metrics_endpoint_exposes_request_histogram() {
    let (app, _) = app();
    get(&app, "/users").await;

    let res = get(&app, "/metrics").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()[header::CONTENT_TYPE],
        "text/plain; version=0.0.4; charset=utf-8"
    );
    let text = body_text(res).await;
    assert!(text.contains("# TYPE http_request_duration_seconds histogram"), "{text}");
    let count_line = r#"_count{method="GET",route="/users",status_code="200"} 1"#;
    assert!(text.contains(&format!("http_request_duration_seconds{count_line}")), "{text}");
    assert!(text.contains("vigil_ready 1"), "{text}");
}

#[tokio::test]
async fn each_request_is_observed_once_with_its_status() {
    let (app, state) = app();
    let metrics = state.metrics();

    post_json(&app, "/users", "{}").await;
    post_json(&app, "/users", r#"{"email":"a@b.com","name":"Emanuel"}"#).await;
    get(&app, "/ready").await;

    let h = &metrics.request_duration;
    assert_eq!(h.sample_count(&labels("POST", "/users", "400")), 1);
    assert_eq!(h.sample_count(&labels("POST", "/users", "201")), 1);
    assert_eq!(h.sample_count(&labels("GET", "/ready", "200")), 1);
    assert_eq!(h.total_count(), 3);
    assert_eq!(metrics.requests_in_flight.get(&[("method", "POST")]), 0);
}

#[tokio::test]
async fn cors_preflight_is_identified_and_observed() {
    let (app, state) = app();
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/users")
        .header(header::ORIGIN, "https://app.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    let id = res.headers()["x-request-id"].to_str().unwrap();
    assert!(is_uuid(id), "{id}");

    let h = &state.metrics().request_duration;
    assert_eq!(h.sample_count(&labels("OPTIONS", "/users", "200")), 1);
    assert_eq!(h.total_count(), 1);
}

#[tokio::test]
async fn unmatched_routes_fall_back_to_raw_path_label() {
    let (app, state) = app();
    get(&app, "/missing/thing").await;
    assert_eq!(
        state.metrics().request_duration.sample_count(&labels("GET", "/missing/thing", "404")),
        1
    );
}

// --------------------
// Rate limiting
// --------------------

#[tokio::test]
async fn rate_limit_rejects_past_max_with_retry_after() {
    let mut cfg = test_config();
    cfg.rate_limit.max = 2;
    cfg.rate_limit.window_ms = 60_000;
    let (app, state) = app_with(cfg);

    let res = get(&app, "/health").await;
    assert_eq!(res.headers()["ratelimit-limit"], "2");
    assert_eq!(res.headers()["ratelimit-remaining"], "1");
    assert_eq!(get(&app, "/health").await.status(), StatusCode::OK);

    let res = get(&app, "/health").await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry: u64 = res.headers()[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry), "{retry}");
    assert_eq!(body_json(res).await["code"], "RATE_LIMITED");

    let metrics = state.metrics();
    assert_eq!(metrics.rate_limited.get(&[]), 1);
    assert_eq!(metrics.request_duration.sample_count(&labels("GET", "/health", "429")), 1);
    assert_eq!(metrics.request_duration.total_count(), 3);
}

#[tokio::test]
async fn rate_limit_keys_by_forwarded_client() {
    let mut cfg = test_config();
    cfg.rate_limit.max = 1;
    let (app, _) = app_with(cfg);

    let from = |ip: &str| {
        Request::builder()
            .uri("/health")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };
    assert_eq!(send(&app, from("10.0.0.1")).await.status(), StatusCode::OK);
    assert_eq!(send(&app, from("10.0.0.2")).await.status(), StatusCode::OK);
    assert_eq!(send(&app, from("10.0.0.1")).await.status(), StatusCode::TOO_MANY_REQUESTS);
}
