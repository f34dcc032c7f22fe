use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use poa_forms::catalog::Catalog;
use poa_forms::config::Letterhead;
use poa_forms::server::{FormService, RemoteFormServer, ServerState, router};
use serde_json::{Value, json};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

const CATALOG: &str = r#"{
    "Visa Application": {"fields": [
        {"name": "fullName", "label": "Full Name", "type": "text"},
        {"name": "passportNumber", "label": "Passport Number", "type": "text"},
        {"name": "dateOfBirth", "label": "Date of Birth", "type": "date"}
    ]},
    "General Power of Attorney": {"fields": [
        {"name": "principalName", "label": "Principal Name", "type": "text"},
        {"name": "agentName", "label": "Agent Name", "type": "text"}
    ]}
}"#;

fn service(output_dir: &Path) -> FormService {
    FormService::new(
        Arc::new(Catalog::from_json_str(CATALOG).unwrap()),
        Letterhead::default(),
        output_dir.to_path_buf(),
    )
}

fn form_post(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/submit")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn index_serves_form_with_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(service(dir.path()))
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let page = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(page.contains(r#"const CATALOG = {"Visa Application":"#));
    assert!(page.contains(r#""General Power of Attorney""#));
}

#[tokio::test]
async fn unknown_document_type_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(service(dir.path()))
        .oneshot(form_post("documentType=UnknownType&fullName=Jane+Doe"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"status": "error", "message": "Invalid document type"})
    );
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn valid_submission_writes_document() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(service(dir.path()))
        .oneshot(form_post(
            "documentType=Visa+Application&fullName=Jane+Doe&passportNumber=X1234567&dateOfBirth=1990-02-03",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Document generated successfully");

    let filename = body["filename"].as_str().unwrap();
    let path = Path::new(filename);
    assert!(path.exists());
    assert!(path.starts_with(dir.path()));
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("Visa_Application_"));
    assert!(name.ends_with(".pdf"));
}

#[tokio::test]
async fn submission_with_missing_fields_still_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(service(dir.path()))
        .oneshot(form_post("documentType=General+Power+of+Attorney"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "success");
}

#[tokio::test]
async fn json_submission_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/submit")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"documentType": "Visa Application", "fullName": "Jane Doe"}).to_string(),
        ))
        .unwrap();
    let response = router(service(dir.path())).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "success");
}

#[tokio::test]
async fn malformed_submission_is_a_client_error() {
    let dir = tempfile::tempdir().unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/submit")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"documentType\": "))
        .unwrap();
    let response = router(service(dir.path())).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().starts_with("Malformed submission"));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let response = router(service(dir.path()))
        .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[test]
fn lifecycle_serves_over_tcp_then_stops() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = RemoteFormServer::new(service(dir.path()));
    assert_eq!(server.state(), ServerState::Idle);

    let addr = server.start("127.0.0.1", 0).unwrap();
    assert_eq!(server.state(), ServerState::Running(addr));
    assert!(server.start("127.0.0.1", 0).is_err());

    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains("Visa Application"));

    server.stop().unwrap();
    assert_eq!(server.state(), ServerState::Stopped);
    assert!(TcpStream::connect(addr).is_err());

    // a stopped server can be started again
    let again = server.start("127.0.0.1", 0).unwrap();
    assert_eq!(server.state(), ServerState::Running(again));
    server.stop().unwrap();
}
