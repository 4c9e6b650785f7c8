//! HttpRemote against an in-process mock of the log server

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use ldash_client::remote::{HttpRemote, LogQuery, RemoteService};
use ldash_client::ClientError;
use ldash_common::config::EndpointPaths;
use ldash_common::events::StageId;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;

async fn start_file_parsing(Json(body): Json<Value>) -> impl IntoResponse {
    let path = body["filePath"].as_str().unwrap_or_default().to_string();
    if path.contains("missing") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": format!("File not found: {}", path)})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"success": true, "message": "Parsing started", "filePath": path})),
    )
}

async fn parsing_status() -> Json<Value> {
    Json(json!({
        "success": true,
        "isParsing": true,
        "status": "Parsing lines",
        "progress": 17.5,
        "stageProgress": 41.0,
        "stageName": "parsing",
        "processed": 4100,
        "total": 10000,
        "filePath": "/var/log/access.log",
        "isCancelled": false,
        "estimatedTimeRemaining": 900,
        "parsingSpeed": 2050.0
    }))
}

async fn status_unavailable() -> Json<Value> {
    Json(json!({"success": false, "error": "status lock timeout", "isParsing": false}))
}

async fn status_not_json() -> &'static str {
    "<html>maintenance</html>"
}

async fn status_server_error() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom")
}

async fn cancel_parsing() -> Json<Value> {
    Json(json!({"success": false, "error": "Parsing not running"}))
}

async fn check_file(Json(body): Json<Value>) -> Json<Value> {
    let path = body["filePath"].as_str().unwrap_or_default();
    if path.contains("missing") {
        Json(json!({"exists": false, "error": "File not found"}))
    } else {
        Json(json!({"exists": true, "size": 2048, "fileName": "access.log"}))
    }
}

async fn check_data() -> Json<Value> {
    Json(json!({"success": true, "hasData": true, "count": 1250}))
}

async fn check_data_failing() -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"success": false, "error": "database unavailable"})),
    )
}

async fn logs(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let page: u32 = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let ip = params.get("clientIp").cloned();
    Json(json!({
        "success": true,
        "logs": [{"clientIp": ip, "url": "http://a.test/"}, {"clientIp": ip, "url": "http://b.test/"}],
        "totalPages": page * 10,
        "stats": {"totalRecords": 2, "hasSearchFilter": params.contains_key("search")}
    }))
}

async fn top_urls(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let limit: u64 = params.get("limit").and_then(|l| l.parse().ok()).unwrap_or(100);
    let data: Vec<Value> = (0..limit.min(5))
        .map(|i| json!({"url": format!("http://site.test/{}", i), "domain": "site.test", "count": 50 - i}))
        .collect();
    Json(json!({"success": true, "data": data, "count": data.len(), "filters": {"ip": "all"}}))
}

async fn top_users() -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"success": false, "error": "Error: database unavailable"})),
    )
}

async fn spawn_mock_server() -> SocketAddr {
    let app = Router::new()
        .route("/api/start-file-parsing", post(start_file_parsing))
        .route("/api/parsing-status", get(parsing_status))
        .route("/api/status-unavailable", get(status_unavailable))
        .route("/api/status-not-json", get(status_not_json))
        .route("/api/status-500", get(status_server_error))
        .route("/api/cancel-parsing", post(cancel_parsing))
        .route("/api/check-file", post(check_file))
        .route("/api/check-data", get(check_data))
        .route("/api/check-data-500", get(check_data_failing))
        .route("/api/logs", get(logs))
        .route("/api/top-urls", get(top_urls))
        .route("/api/top-users", get(top_users));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn remote_for(addr: SocketAddr, endpoints: EndpointPaths) -> HttpRemote {
    HttpRemote::new(&format!("http://{}/", addr), endpoints).unwrap()
}

#[tokio::test]
async fn test_start_accepted_and_rejected() {
    let addr = spawn_mock_server().await;
    let remote = remote_for(addr, EndpointPaths::default());

    let ack = remote.start_operation("/var/log/access.log").await.unwrap();
    assert!(ack.accepted);
    assert_eq!(ack.message.as_deref(), Some("Parsing started"));

    // 400 with a JSON body is a rejection, not a transport failure
    let rejected = remote.start_operation("/var/log/missing.log").await.unwrap();
    assert!(!rejected.accepted);
    assert_eq!(
        rejected.rejection_reason("rejected"),
        "File not found: /var/log/missing.log"
    );
}

#[tokio::test]
async fn test_legacy_status_decoded() {
    let addr = spawn_mock_server().await;
    let remote = remote_for(addr, EndpointPaths::default());

    let status = remote.poll_status().await.unwrap();
    assert!(status.is_running);
    assert_eq!(status.stage(), Some(StageId::Parsing));
    assert_eq!(status.stage_percent, 41.0);
    assert_eq!(status.processed_units, 4100);
    assert_eq!(status.total_units, 10000);
    assert_eq!(status.overall_percent, Some(17.5));
}

#[tokio::test]
async fn test_status_failures_are_transient() {
    let addr = spawn_mock_server().await;

    for (path, expect_malformed) in [
        ("/api/status-unavailable", false),
        ("/api/status-not-json", true),
        ("/api/status-500", false),
    ] {
        let remote = remote_for(
            addr,
            EndpointPaths {
                parsing_status: path.to_string(),
                ..EndpointPaths::default()
            },
        );
        let err = remote.poll_status().await.unwrap_err();
        assert!(err.is_transient(), "{} gave {}", path, err);
        assert_eq!(
            matches!(err, ClientError::MalformedResponse(_)),
            expect_malformed,
            "{} gave {}",
            path,
            err
        );
    }
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let remote = remote_for(addr, EndpointPaths::default());
    let err = remote.poll_status().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}

#[tokio::test]
async fn test_cancel_and_check_file() {
    let addr = spawn_mock_server().await;
    let remote = remote_for(addr, EndpointPaths::default());

    let ack = remote.cancel_operation().await.unwrap();
    assert!(!ack.accepted);
    assert_eq!(ack.rejection_reason("x"), "Parsing not running");

    let found = remote.check_file("/var/log/access.log").await.unwrap();
    assert!(found.exists);
    assert_eq!(found.size, Some(2048));
    assert_eq!(found.file_name.as_deref(), Some("access.log"));

    let missing = remote.check_file("/var/log/missing.log").await.unwrap();
    assert!(!missing.exists);
}

#[tokio::test]
async fn test_logs_query_parameters_forwarded() {
    let addr = spawn_mock_server().await;
    let remote = remote_for(addr, EndpointPaths::default());

    let page = remote
        .fetch_logs(&LogQuery {
            page: 3,
            client_ip: Some("10.1.2.3".to_string()),
            ..LogQuery::default()
        })
        .await
        .unwrap();

    assert_eq!(page.logs.len(), 2);
    assert_eq!(page.total_pages, 30);
    assert_eq!(page.logs[0]["clientIp"], "10.1.2.3");
    assert_eq!(page.stats.unwrap()["hasSearchFilter"], false);
}

#[tokio::test]
async fn test_top_lists() {
    let addr = spawn_mock_server().await;
    let remote = remote_for(addr, EndpointPaths::default());

    let urls = remote.fetch_top_urls(3).await.unwrap();
    assert_eq!(urls.len(), 3);
    assert_eq!(urls[0].url, "http://site.test/0");
    assert_eq!(urls[0].count, 50);

    match remote.fetch_top_users(10).await {
        Err(ClientError::ServerReportedFailure(message)) => {
            assert_eq!(message, "Error: database unavailable")
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_check_data() {
    let addr = spawn_mock_server().await;

    let check = remote_for(addr, EndpointPaths::default())
        .check_data()
        .await
        .unwrap();
    assert!(check.has_data);
    assert_eq!(check.count, Some(1250));

    let failing = remote_for(
        addr,
        EndpointPaths {
            check_data: "/api/check-data-500".to_string(),
            ..EndpointPaths::default()
        },
    );
    match failing.check_data().await {
        Err(ClientError::ServerReportedFailure(message)) => {
            assert_eq!(message, "database unavailable")
        }
        other => panic!("unexpected result: {:?}", other),
    }
}
