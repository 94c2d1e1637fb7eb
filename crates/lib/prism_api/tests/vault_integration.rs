//! Integration test: build the router over in-memory stores and drive the
//! vault surface end to end.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use prism_api::{AppState, config::ApiConfig};
use prism_core::models::session::SessionKind;
use prism_core::session::{Approver, SessionStore};
use prism_core::storage::{BlobStore, FsBlobStore, MemoryBlobStore};
use prism_core::store::{DocumentStore, MemoryStore};
use tower::ServiceExt;

const BOUNDARY: &str = "prism-test-boundary";

struct TestApp {
    app: Router,
    docs: Arc<dyn DocumentStore>,
    token: String,
}

fn config(vault_dir: &std::path::Path) -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        vault_dir: vault_dir.to_path_buf(),
        public_base_url: "https://prism.test".into(),
        max_upload_bytes: 1024 * 1024,
    }
}

async fn authenticated_token(docs: Arc<dyn DocumentStore>) -> String {
    let pending = SessionStore::new(docs.clone())
        .create_pending()
        .await
        .expect("create pending session");
    Approver::new(docs)
        .approve(&SessionKind::Direct, &pending.id, chrono::Duration::hours(1))
        .await
        .expect("approve session");
    pending.id
}

async fn test_app(blobs: Arc<dyn BlobStore>, vault_dir: &std::path::Path) -> TestApp {
    let docs: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let token = authenticated_token(docs.clone()).await;
    let app = prism_api::router(AppState::new(docs.clone(), blobs, config(vault_dir)));
    TestApp { app, docs, token }
}

fn multipart_body(field: &str, file_name: &str, mime: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {mime}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(token: &str, field: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/vault")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(
            field,
            file_name,
            "application/pdf",
            bytes,
        )))
        .unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body")
        .to_vec()
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(resp).await).expect("parse JSON")
}

#[tokio::test]
async fn upload_protect_and_share_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let t = test_app(Arc::new(FsBlobStore::new(dir.path())), dir.path()).await;
    let pdf = b"%PDF-1.7 quarterly numbers";

    // Upload.
    let resp = t
        .app
        .clone()
        .oneshot(upload_request(&t.token, "file", "report.pdf", pdf))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(dir.path().join("vault").join("report.pdf").exists());

    // Listed as public, no code.
    let resp = t.app.clone().oneshot(get("/vault", Some(&t.token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["success"], true);
    let item = &json["files"][0];
    assert_eq!(item["name"], "report.pdf");
    assert_eq!(item["visibility"], "public");
    assert_eq!(item["hasAccessCode"], false);
    assert_eq!(item["status"], "local");
    assert_eq!(item["type"], "pdf");
    assert_eq!(item["shareUrl"], "https://prism.test/v/report.pdf");
    assert_eq!(item["url"], "/vault?file=report.pdf&action=preview");

    // Protect with a code.
    let resp = t
        .app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/vault",
            Some(&t.token),
            serde_json::json!({
                "fileName": "report.pdf",
                "visibility": "protected",
                "accessCode": "xk29"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["file"]["hasAccessCode"], true);

    // Metadata is public even for protected files.
    let resp = t
        .app
        .clone()
        .oneshot(get("/vault/share?file=report.pdf", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["success"], true);
    let file = &json["file"];
    assert_eq!(file["name"], "report.pdf");
    assert_eq!(file["visibility"], "protected");
    assert_eq!(file["type"], "pdf");
    assert_eq!(file["size"], pdf.len());
    assert_eq!(file["status"], "local");
    assert_eq!(file["hasAccessCode"], true);
    assert!(file.get("accessCode").is_none());

    // Download without code is refused.
    let resp = t
        .app
        .clone()
        .oneshot(get("/vault/share?file=report.pdf&action=download", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);

    // Download with the code releases the bytes as an attachment.
    let resp = t
        .app
        .clone()
        .oneshot(get(
            "/vault/share?file=report.pdf&action=download&code=xk29",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"report.pdf\""
    );
    assert_eq!(body_bytes(resp).await, pdf);
}

#[tokio::test]
async fn admin_routes_require_authenticated_session() {
    let dir = tempfile::tempdir().unwrap();
    let t = test_app(Arc::new(MemoryBlobStore::new()), dir.path()).await;

    let resp = t.app.clone().oneshot(get("/vault", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = t
        .app
        .clone()
        .oneshot(get("/vault", Some("not-a-session")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // A pending (unapproved) session is not enough.
    let pending = SessionStore::new(t.docs.clone()).create_pending().await.unwrap();
    let resp = t
        .app
        .clone()
        .oneshot(get("/vault", Some(&pending.id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Revoking the live session locks the console out.
    Approver::new(t.docs.clone())
        .revoke(&SessionKind::Direct, &t.token)
        .await
        .unwrap();
    let resp = t.app.clone().oneshot(get("/vault", Some(&t.token))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn shared_link_session_needs_bound_visitor() {
    let dir = tempfile::tempdir().unwrap();
    let t = test_app(Arc::new(MemoryBlobStore::new()), dir.path()).await;
    let approver = Approver::new(t.docs.clone());
    let link = approver.create_shared_link(None).await.unwrap();
    SessionStore::new(t.docs.clone())
        .request_access(&link.id, "visitor-1")
        .await
        .unwrap();
    approver
        .approve(&SessionKind::shared(), &link.id, chrono::Duration::minutes(5))
        .await
        .unwrap();

    // Holding the link alone is not enough.
    let resp = t.app.clone().oneshot(get("/vault", Some(&link.id))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["success"], false);

    // Another browser presenting the same link is turned away.
    for (visitor, status) in [
        ("visitor-2", StatusCode::UNAUTHORIZED),
        ("visitor-1", StatusCode::OK),
    ] {
        let req = Request::builder()
            .uri("/vault")
            .header(header::AUTHORIZATION, format!("Bearer {}", link.id))
            .header("x-visitor-id", visitor)
            .body(Body::empty())
            .unwrap();
        let resp = t.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), status, "{visitor}");
    }
}

#[tokio::test]
async fn upload_without_file_field_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let t = test_app(Arc::new(MemoryBlobStore::new()), dir.path()).await;
    let resp = t
        .app
        .clone()
        .oneshot(upload_request(&t.token, "attachment", "report.pdf", b"x"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "No file provided");
}

#[tokio::test]
async fn inline_copy_serves_when_primary_is_down() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(MemoryBlobStore::new());
    let t = test_app(blobs.clone(), dir.path()).await;

    t.app
        .clone()
        .oneshot(upload_request(&t.token, "file", "clip.mp4", b"frames"))
        .await
        .unwrap();
    let resp = t
        .app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/vault",
            Some(&t.token),
            serde_json::json!({ "fileName": "clip.mp4", "syncToDB": true }),
        ))
        .await
        .unwrap();
    let json = body_json(resp).await;
    assert_eq!(json["file"]["status"], "db");

    blobs.set_offline(true);
    let resp = t
        .app
        .clone()
        .oneshot(get("/vault/share?file=clip.mp4&action=raw", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "video/mp4");
    assert!(resp.headers().get(header::CONTENT_DISPOSITION).is_none());
    assert_eq!(body_bytes(resp).await, b"frames");
}

#[tokio::test]
async fn missing_files_and_payloads_are_404() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(MemoryBlobStore::new());
    let t = test_app(blobs.clone(), dir.path()).await;

    let resp = t
        .app
        .clone()
        .oneshot(get("/vault/share?file=nope.pdf", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    t.app
        .clone()
        .oneshot(upload_request(&t.token, "file", "gone.pdf", b"x"))
        .await
        .unwrap();
    blobs.delete("vault/gone.pdf").await.unwrap();
    let resp = t
        .app
        .clone()
        .oneshot(get("/vault/share?file=gone.pdf&action=raw", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let json = body_json(resp).await;
    assert_eq!(json["error"], "File content unavailable");

    let resp = t
        .app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/vault",
            Some(&t.token),
            serde_json::json!({ "fileName": "nope.pdf", "visibility": "protected" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn verify_code_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let t = test_app(Arc::new(MemoryBlobStore::new()), dir.path()).await;
    t.app
        .clone()
        .oneshot(upload_request(&t.token, "file", "a.pdf", b"x"))
        .await
        .unwrap();
    t.app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/vault",
            Some(&t.token),
            serde_json::json!({ "fileName": "a.pdf", "visibility": "protected", "accessCode": "1234" }),
        ))
        .await
        .unwrap();

    let resp = t
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/vault/share",
            None,
            serde_json::json!({ "filename": "a.pdf", "accessCode": "12345" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = t
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/vault/share",
            None,
            serde_json::json!({ "filename": "a.pdf", "accessCode": "1234" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["success"], true);

    let req = Request::builder()
        .method("DELETE")
        .uri("/vault?file=a.pdf")
        .header(header::AUTHORIZATION, format!("Bearer {}", t.token))
        .body(Body::empty())
        .unwrap();
    let resp = t.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = t
        .app
        .clone()
        .oneshot(get("/vault/share?file=a.pdf", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn verify_code_needs_credentials_and_a_stored_code() {
    let dir = tempfile::tempdir().unwrap();
    let t = test_app(Arc::new(MemoryBlobStore::new()), dir.path()).await;
    t.app
        .clone()
        .oneshot(upload_request(&t.token, "file", "open.pdf", b"x"))
        .await
        .unwrap();

    // Public file without a stored code: no code verifies.
    let resp = t
        .app
        .clone()
        .oneshot(json_request(
            "POST",
            "/vault/share",
            None,
            serde_json::json!({ "filename": "open.pdf", "accessCode": "anything" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    for body in [
        serde_json::json!({ "filename": "open.pdf" }),
        serde_json::json!({ "filename": "open.pdf", "accessCode": "" }),
        serde_json::json!({ "accessCode": "x" }),
        serde_json::json!({ "filename": "", "accessCode": "x" }),
    ] {
        let resp = t
            .app
            .clone()
            .oneshot(json_request("POST", "/vault/share", None, body.clone()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
        let json = body_json(resp).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Missing security credentials");
    }
}

#[tokio::test]
async fn malformed_bodies_get_the_error_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let t = test_app(Arc::new(MemoryBlobStore::new()), dir.path()).await;

    // PATCH without the required fileName.
    let resp = t
        .app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/vault",
            Some(&t.token),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].is_string());

    // Body that is not JSON at all.
    let req = Request::builder()
        .method("POST")
        .uri("/vault/share")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = t.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["success"], false);

    // Upload without a multipart content type.
    let req = Request::builder()
        .method("POST")
        .uri("/vault")
        .header(header::AUTHORIZATION, format!("Bearer {}", t.token))
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hello"))
        .unwrap();
    let resp = t.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["success"], false);
}

#[tokio::test]
async fn dotted_file_names_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let t = test_app(Arc::new(MemoryBlobStore::new()), dir.path()).await;
    let resp = t
        .app
        .clone()
        .oneshot(upload_request(&t.token, "file", "v1..2.pdf", b"draft"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["file"]["name"], "v1..2.pdf");

    let resp = t
        .app
        .clone()
        .oneshot(get("/vault/share?file=v1..2.pdf&action=raw", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, b"draft");
}

#[tokio::test]
async fn traversal_names_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let t = test_app(Arc::new(MemoryBlobStore::new()), dir.path()).await;
    let resp = t
        .app
        .clone()
        .oneshot(get("/vault/share?file=..%2Fsecret&action=raw", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_is_public() {
    let dir = tempfile::tempdir().unwrap();
    let t = test_app(Arc::new(MemoryBlobStore::new()), dir.path()).await;
    let resp = t.app.clone().oneshot(get("/health", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "ok");
}
