use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use svnhook_core::{
    assemble_payload, Dispatcher, EventType, PayloadInput, RepositoryInfo, WebhookClient,
    WebhookPayload,
};

#[derive(Clone)]
struct Receiver {
    status: StatusCode,
    received: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
}

async fn receive(
    State(receiver): State<Receiver>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, &'static str) {
    receiver.received.lock().unwrap().push((headers, body));
    (receiver.status, "ack")
}

/// Start a stub review service answering every POST with `status`.
async fn stub_server(status: StatusCode) -> (String, Receiver) {
    let receiver = Receiver {
        status,
        received: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/review/webhook", post(receive))
        .with_state(receiver.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/review/webhook", addr), receiver)
}

fn payload(event: EventType) -> WebhookPayload {
    let repo = RepositoryInfo {
        uuid: "8f3a-uuid".to_string(),
        url: "https://svn.example.com/svn/repo1".to_string(),
        relative_url: "^/".to_string(),
        root_url: "https://svn.example.com/svn/repo1".to_string(),
        revision: "41".to_string(),
        working_copy_root: PathBuf::from("/work/repo1"),
    };
    assemble_payload(
        &repo,
        &PayloadInput::new(event, &[]),
        Utc.with_ymd_and_hms(2025, 8, 18, 3, 23, 30).unwrap(),
    )
}

fn client(endpoint: &str) -> WebhookClient {
    WebhookClient::new(endpoint, "t0k3n", Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_send_succeeds_on_200_with_headers_and_body() {
    let (endpoint, receiver) = stub_server(StatusCode::OK).await;

    let sent = client(&endpoint)
        .send(&payload(EventType::PreCommit), EventType::PreCommit)
        .await;
    assert!(sent);

    let received = receiver.received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let (headers, body) = &received[0];
    assert_eq!(headers["x-subversion-event"], "Pre-Commit");
    assert_eq!(headers["x-subversion-token"], "t0k3n");
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(body["object_kind"], "svn_commit");
    assert_eq!(body["repository"]["name"], "repo1");
}

#[tokio::test]
async fn test_send_succeeds_on_202() {
    let (endpoint, _receiver) = stub_server(StatusCode::ACCEPTED).await;
    assert!(
        client(&endpoint)
            .send(&payload(EventType::PostCommit), EventType::PostCommit)
            .await
    );
}

#[tokio::test]
async fn test_send_fails_on_server_error_without_retry() {
    let (endpoint, receiver) = stub_server(StatusCode::INTERNAL_SERVER_ERROR).await;

    let sent = client(&endpoint)
        .send(&payload(EventType::PostCommit), EventType::PostCommit)
        .await;
    assert!(!sent);
    assert_eq!(receiver.received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_send_fails_on_client_error() {
    let (endpoint, _receiver) = stub_server(StatusCode::UNAUTHORIZED).await;
    assert!(
        !client(&endpoint)
            .send(&payload(EventType::PreCommit), EventType::PreCommit)
            .await
    );
}

#[tokio::test]
async fn test_send_fails_when_nothing_listens() {
    // Bind then drop to get a port that refuses connections
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let endpoint = format!("http://{}/review/webhook", addr);
    assert!(
        !client(&endpoint)
            .send(&payload(EventType::PreCommit), EventType::PreCommit)
            .await
    );
}
