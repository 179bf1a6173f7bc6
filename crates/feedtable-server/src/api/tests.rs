use std::collections::HashSet;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::Request;
use feedtable_core::{AppConfig, Environment, PartitionScheme, RowKeyPolicy};
use tower::ServiceExt;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

const VALID: &str = "Mon, 02 Jan 2006 15:04:05 -0700";

fn test_config(server: &MockServer) -> AppConfig {
    AppConfig {
        env: Environment::Test,
        bind_addr: "127.0.0.1:0".parse().expect("addr"),
        log_level: "debug".to_string(),
        tenant_id: "tenant-1".to_string(),
        client_id: "client-1".to_string(),
        client_secret: "secret-1".to_string(),
        authority_host: server.uri(),
        token_scope: "https://cosmos.azure.com/.default".to_string(),
        table_endpoint: format!("{}/{{account}}", server.uri()),
        default_account: None,
        default_table: None,
        user_agent: "feedtable-test".to_string(),
        fetch_timeout_secs: 10,
        max_feed_bytes: 1024 * 1024,
        store_timeout_secs: 10,
        store_max_retries: 0,
        store_retry_backoff_ms: 0,
        request_deadline_secs: 30,
        row_key_policy: RowKeyPolicy::Sequence,
        partition: PartitionScheme::Constant("id".to_string()),
        cors_origins: vec![
            "http://localhost".to_string(),
            "https://portal.azure.com".to_string(),
        ],
    }
}

fn app(config: &AppConfig) -> Router {
    let handler = IngestionHandler::from_app_config(config).expect("handler");
    build_app(
        AppState {
            handler: Arc::new(handler),
        },
        &config.cors_origins,
    )
}

fn rss(items: &[(&str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, date)| {
            format!(
                "<item><title>{title}</title><link>https://example.com/{title}</link>\
                 <description><![CDATA[<p>{title}</p>]]></description>\
                 <pubDate>{date}</pubDate><guid>guid-{title}</guid></item>"
            )
        })
        .collect();
    format!(r#"<?xml version="1.0"?><rss version="2.0"><channel>{items}</channel></rss>"#)
}

async fn mount_feed(server: &MockServer, feed_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(feed_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "tok"
        })))
        .mount(server)
        .await;
}

async fn mount_table(server: &MockServer, expected_puts: u64) {
    Mock::given(method("PUT"))
        .and(path_regex(r"^/acct1/news\(PartitionKey='id',RowKey='[0-9-]+'\)$"))
        .respond_with(ResponseTemplate::new(204))
        .expect(expected_puts)
        .mount(server)
        .await;
}

fn post(server: &MockServer, feed_path: &str) -> Request<Body> {
    let body = serde_json::json!({
        "url": format!("{}{feed_path}", server.uri()),
        "account": "acct1",
        "table": "news",
    });
    Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&body).expect("json parse")
}

#[test]
fn api_error_codes_map_to_statuses() {
    let cases = [
        ("validation_error", StatusCode::BAD_REQUEST),
        ("parse_failed", StatusCode::UNPROCESSABLE_ENTITY),
        ("fetch_failed", StatusCode::BAD_GATEWAY),
        ("fetch_timeout", StatusCode::GATEWAY_TIMEOUT),
        ("store_unavailable", StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (code, status) in cases {
        let response = ApiError::new("req-1", code, "msg").into_response();
        assert_eq!(response.status(), status, "code {code}");
    }
}

#[tokio::test]
async fn get_root_says_hello_world() {
    let server = MockServer::start().await;
    let response = app(&test_config(&server))
        .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    assert_eq!(&body[..], b"hello world");
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let server = MockServer::start().await;
    let app = app(&test_config(&server));

    let echoed = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/")
                .header("x-request-id", "req-abc")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(echoed.headers()["x-request-id"], "req-abc");

    let generated = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let id = generated.headers()["x-request-id"]
        .to_str()
        .expect("ascii");
    assert_eq!(id.len(), 36, "uuid v4 expected, got {id}");
}

#[tokio::test]
async fn configured_origin_is_allowed() {
    let server = MockServer::start().await;
    let response = app(&test_config(&server))
        .oneshot(
            Request::builder()
                .uri("/")
                .header("origin", "https://portal.azure.com")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://portal.azure.com"
    );
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let server = MockServer::start().await;
    let response = app(&test_config(&server))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .header("x-request-id", "req-bad")
                .body(Body::from("{not json"))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "validation_error");
    assert_eq!(json["meta"]["request_id"], "req-bad");
}

#[tokio::test]
async fn missing_url_is_a_validation_error() {
    let server = MockServer::start().await;
    let response = app(&test_config(&server))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"account":"acct1","table":"news"}"#))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(
        json["error"]["message"]
            .as_str()
            .is_some_and(|m| m.contains("url")),
        "got: {json}"
    );
}

#[tokio::test]
async fn mixed_batch_reports_breakdown_with_success_status() {
    let server = MockServer::start().await;
    mount_feed(&server, "/feed", rss(&[("A", VALID), ("B", "02/01/2006")])).await;
    mount_token(&server).await;
    mount_table(&server, 1).await;

    let response = app(&test_config(&server))
        .oneshot(post(&server, "/feed"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let data = &json["data"];
    assert_eq!(data["seen"], 2);
    assert_eq!(data["stored"], 1);
    assert_eq!(data["failed"], 1);
    assert_eq!(data["entries"][0]["status"], "stored");
    assert_eq!(data["entries"][1]["status"], "failed");
    assert_eq!(data["entries"][1]["kind"], "date_format");
    assert_eq!(data["entries"][1]["title"], "B");
    assert!(
        data["first_failure"]
            .as_str()
            .is_some_and(|m| m.starts_with("entry 1 (B)")),
        "got: {data}"
    );
}

#[tokio::test]
async fn non_xml_feed_is_unprocessable_and_stores_nothing() {
    let server = MockServer::start().await;
    mount_feed(&server, "/feed", "definitely not xml".to_string()).await;
    mount_token(&server).await;
    mount_table(&server, 0).await;

    let response = app(&test_config(&server))
        .oneshot(post(&server, "/feed"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "parse_failed");
}

#[tokio::test]
async fn unreachable_feed_is_a_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_table(&server, 0).await;

    let response = app(&test_config(&server))
        .oneshot(post(&server, "/missing"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "fetch_failed");
}

#[tokio::test]
async fn store_rejection_is_an_entry_failure() {
    let server = MockServer::start().await;
    mount_feed(&server, "/feed", rss(&[("A", VALID)])).await;
    mount_token(&server).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "odata.error": {
                "code": "AuthorizationPermissionMismatch",
                "message": { "lang": "en-US", "value": "not allowed" }
            }
        })))
        .mount(&server)
        .await;

    let response = app(&test_config(&server))
        .oneshot(post(&server, "/feed"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["data"]["failed"], 1);
    assert_eq!(json["data"]["entries"][0]["kind"], "store");
    assert!(json["data"]["entries"][0]["reason"]
        .as_str()
        .is_some_and(|r| r.contains("AuthorizationPermissionMismatch")));
}

#[tokio::test]
async fn concurrent_posts_get_distinct_row_keys() {
    let server = MockServer::start().await;
    mount_feed(&server, "/one", rss(&[("one", VALID)])).await;
    mount_feed(&server, "/two", rss(&[("two", VALID)])).await;
    mount_token(&server).await;
    mount_table(&server, 2).await;
    let app = app(&test_config(&server));

    let (first, second) = tokio::join!(
        app.clone().oneshot(post(&server, "/one")),
        app.clone().oneshot(post(&server, "/two")),
    );
    let first = json_body(first.expect("response")).await;
    let second = json_body(second.expect("response")).await;

    let keys: HashSet<String> = [first, second]
        .iter()
        .map(|json| {
            json["data"]["entries"][0]["row_key"]
                .as_str()
                .expect("row key")
                .to_string()
        })
        .collect();
    assert_eq!(keys.len(), 2, "row keys must differ: {keys:?}");
}
