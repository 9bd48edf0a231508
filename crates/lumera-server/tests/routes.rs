use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::util::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lumera_booking::client::{BookingClient, BookingConfig};
use lumera_cms::client::CmsClient;
use lumera_cms::config::CmsConfig;
use lumera_core::cache::ResponseCache;
use lumera_core::transport::RetryPolicy;
use lumera_server::server::{AppState, build_app};

fn app_state(server: &MockServer, max_retries: u32) -> AppState {
    let cache = Arc::new(ResponseCache::new());
    let policy = RetryPolicy::default()
        .with_max_retries(max_retries)
        .with_base_delay(Duration::from_millis(5));
    let cms = Arc::new(CmsClient::new(
        CmsConfig::new(server.uri(), "lumera", "client-id", "client-secret"),
        policy.clone(),
        Arc::clone(&cache),
    ));
    let booking = Arc::new(BookingClient::new(
        BookingConfig::new(server.uri(), "public-token"),
        policy,
    ));
    AppState {
        cms,
        booking,
        cache,
        franchises_ttl: Duration::from_secs(600),
    }
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/identity-server/connect/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "test-token"})),
        )
        .mount(server)
        .await;
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_reports_ok() {
    let server = MockServer::start().await;
    let app = build_app(app_state(&server, 0));

    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn mismatched_pagination_is_a_bad_request_problem() {
    let server = MockServer::start().await;
    let app = build_app(app_state(&server, 0));

    let response = app
        .oneshot(
            Request::get("/api/cms/locations?page=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/problem+json"
    );
    let problem = body_json(response).await;
    assert_eq!(problem["code"], "bad_request");
    // Rejected before any upstream traffic.
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn latest_content_flows_through() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/content/lumera/home"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "items": [{"data": {"headline": "welcome"}}]
        })))
        .mount(&server)
        .await;

    let app = build_app(app_state(&server, 0));
    let response = app
        .oneshot(Request::get("/api/cms/home").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"headline": "welcome"}));
}

#[tokio::test]
async fn missing_blog_post_is_a_not_found_problem() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/content/lumera/blog"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 0, "items": []})))
        .mount(&server)
        .await;

    let app = build_app(app_state(&server, 0));
    let response = app
        .oneshot(
            Request::get("/api/cms/blog/posts/missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let problem = body_json(response).await;
    assert_eq!(problem["code"], "not_found");
}

#[tokio::test]
async fn upstream_server_errors_surface_as_bad_gateway() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/content/lumera/home"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let app = build_app(app_state(&server, 0));
    let response = app
        .oneshot(Request::get("/api/cms/home").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let problem = body_json(response).await;
    assert_eq!(problem["code"], "external_api_error");
    assert_eq!(problem["service"], "cms");
    assert_eq!(problem["upstreamStatus"], 500);
}

#[tokio::test]
async fn geo_restricted_listing_enriches_from_the_booking_backend() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/franchises"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "franchises": [{"id": 1, "address": {"latitude": -23.5, "longitude": -46.6}}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/content/lumera/location"))
        .and(query_param("$filter", "data/externalId/iv in ('1')"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "items": [{"data": {"externalId": "1", "name": "Centro"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_app(app_state(&server, 0));
    let response = app
        .oneshot(
            Request::get("/api/cms/locations?onlyWithGeo=true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_json(response).await;
    assert_eq!(listing[0]["data"]["address"]["latitude"], -23.5);
    assert_eq!(listing[0]["data"]["address"]["longitude"], -46.6);
}

#[tokio::test]
async fn cache_clear_forces_a_refetch() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/content/lumera/home"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "items": [{"data": {"v": 1}}]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let state = app_state(&server, 0);
    let app = build_app(state);

    let first = app
        .clone()
        .oneshot(Request::get("/api/cms/home").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let cleared = app
        .clone()
        .oneshot(
            Request::post("/api/cms/cache/clear")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(cleared.status(), StatusCode::NO_CONTENT);

    let second = app
        .oneshot(Request::get("/api/cms/home").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
}

#[tokio::test]
async fn schedule_hours_requires_a_date() {
    let server = MockServer::start().await;
    let app = build_app(app_state(&server, 0));

    let response = app
        .oneshot(
            Request::get("/api/franchises/42/schedule/hours")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let problem = body_json(response).await;
    assert_eq!(problem["code"], "bad_request");
}

#[tokio::test]
async fn leads_are_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/lead"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"created": true})))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_app(app_state(&server, 0));
    let response = app
        .oneshot(
            Request::post("/api/leads")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "franchiseId": 7,
                        "name": "Ana",
                        "cellPhone": "+5511999999999"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"created": true}));
}

#[tokio::test]
async fn request_id_is_echoed_on_responses() {
    let server = MockServer::start().await;
    let app = build_app(app_state(&server, 0));

    let response = app
        .oneshot(
            Request::get("/healthz")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers().get("x-request-id").unwrap(), "abc-123");
}
