use axum::{
    Router,
    body::{Body, Bytes, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use buckets::{
    models::operation::OperationKind,
    routes::routes::{AppState, app},
    services::{
        access_gate::{AccessGate, AuthRequirements},
        object_store::ObjectStore,
    },
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const TOKEN: &str = "test-token";

fn test_app(requirements: AuthRequirements) -> (TempDir, Router) {
    test_app_with_limit(requirements, 1024 * 1024)
}

fn test_app_with_limit(requirements: AuthRequirements, limit: usize) -> (TempDir, Router) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let state = AppState::new(
        ObjectStore::new(dir.path()),
        AccessGate::new(requirements, vec![TOKEN.to_string()]),
    );
    (dir, app(state, limit))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body)
}

fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn put_raw(uri: &str, mime: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method(Method::PUT)
        .uri(uri)
        .header(header::CONTENT_TYPE, mime)
        .body(Body::from(data.to_vec()))
        .unwrap()
}

fn json(body: &Bytes) -> Value {
    serde_json::from_slice(body).expect("response body is JSON")
}

async fn create(app: &Router, bucket: &str, mime: &str, name: &str, data: &[u8]) -> String {
    let uri = format!("/Bucket/{bucket}?nameOverride={name}");
    let (status, _, body) = send(app, put_raw(&uri, mime, data)).await;
    assert_eq!(status, StatusCode::OK);
    json(&body).as_str().expect("id is a JSON string").to_string()
}

#[tokio::test]
async fn put_get_delete_lifecycle() {
    let (_dir, app) = test_app(AuthRequirements::open());

    let id = create(&app, "photos", "image/png", "a.png", &[0x01, 0x02, 0x03]).await;

    let (status, headers, body) =
        send(&app, request(Method::GET, &format!("/Bucket/photos/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], &[0x01, 0x02, 0x03]);
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(headers[header::CONTENT_LENGTH], "3");
    assert_eq!(headers["x-buckets-bucket-name"], "photos");
    assert_eq!(headers["x-buckets-object-name"], "a.png");
    assert_eq!(headers["x-buckets-object-id"], id.as_str());

    let (status, _, body) = send(&app, request(Method::GET, "/Bucket/List")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), serde_json::json!(["photos"]));

    let (status, _, _) =
        send(&app, request(Method::DELETE, &format!("/Bucket/photos/{id}"))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(&app, request(Method::GET, &format!("/Bucket/photos/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) = send(&app, request(Method::GET, "/Bucket/List")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), serde_json::json!([]));
}

#[tokio::test]
async fn head_returns_headers_without_body() {
    let (_dir, app) = test_app(AuthRequirements::open());
    let id = create(&app, "docs", "text/plain", "notes.txt", b"hello").await;

    let (status, headers, body) =
        send(&app, request(Method::HEAD, &format!("/Bucket/docs/{id}"))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    assert_eq!(headers["x-buckets-object-size"], "5");
    assert_eq!(headers["x-buckets-object-name"], "notes.txt");

    let (status, _, _) = send(&app, request(Method::HEAD, "/Bucket/docs/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_objects_in_bucket() {
    let (_dir, app) = test_app(AuthRequirements::open());
    let first = create(&app, "b", "text/plain", "1", b"1").await;
    let second = create(&app, "b", "text/plain", "2", b"2").await;

    let (status, _, body) = send(&app, request(Method::GET, "/Bucket/b/List")).await;
    assert_eq!(status, StatusCode::OK);
    let mut expected = vec![first, second];
    expected.sort();
    assert_eq!(json(&body), serde_json::json!(expected));

    let (status, _, body) = send(&app, request(Method::GET, "/Bucket/nope/List")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["error"], true);
}

#[tokio::test]
async fn invalid_names_are_bad_requests() {
    let (_dir, app) = test_app(AuthRequirements::open());

    let cases = [
        request(Method::GET, "/Bucket/a..b/List"),
        request(Method::GET, "/Bucket/photos/..%2Fsecret"),
        request(Method::HEAD, "/Bucket/a%2Fb/id"),
        request(Method::DELETE, "/Bucket/photos/%2E%2E"),
        request(Method::GET, "/Bucket/%20/List"),
        put_raw("/Bucket/..", "text/plain", b"x"),
    ];
    for req in cases {
        let uri = req.uri().clone();
        let (status, _, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        if !body.is_empty() {
            assert_eq!(json(&body)["error"], true, "{uri}");
        }
    }

    let (_, _, body) = send(&app, request(Method::GET, "/Bucket/List")).await;
    assert_eq!(json(&body), serde_json::json!([]));
}

#[tokio::test]
async fn delete_missing_object_is_not_found() {
    let (_dir, app) = test_app(AuthRequirements::open());
    let (status, _, body) = send(&app, request(Method::DELETE, "/Bucket/b/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        json(&body)["message"],
        "The specified object could not be found"
    );
}

#[tokio::test]
async fn create_without_token_is_forbidden_when_required() {
    let (dir, app) = test_app(AuthRequirements::requiring([OperationKind::ObjectCreate]));

    let (status, _, body) = send(&app, put_raw("/Bucket/b", "text/plain", b"x")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let body = json(&body);
    assert_eq!(body["error"], true);
    assert_eq!(body["message"], "No Authorization header provided");
    assert!(!dir.path().join("b").exists());
}

#[tokio::test]
async fn bearer_token_checks() {
    let (_dir, app) = test_app(AuthRequirements::requiring(OperationKind::ALL));

    let with_auth = |value: &str| {
        Request::builder()
            .uri("/Bucket/List")
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap()
    };

    let (status, _, body) = send(&app, with_auth("Token abc")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        json(&body)["message"],
        "Authorization header is not a bearer token"
    );

    let (status, _, body) = send(&app, with_auth("Bearer wrong")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json(&body)["message"], "Authorization header token is invalid");

    let (status, _, _) = send(&app, with_auth(&format!("Bearer {TOKEN}"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn denied_before_validation() {
    let (_dir, app) = test_app(AuthRequirements::requiring([OperationKind::ObjectRead]));
    let (status, _, _) = send(&app, request(Method::GET, "/Bucket/a..b/id")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn authentication_requirements_are_public() {
    let (_dir, app) = test_app(AuthRequirements::requiring([
        OperationKind::ObjectCreate,
        OperationKind::ObjectDelete,
    ]));

    let (status, _, body) = send(
        &app,
        request(Method::GET, "/System/AuthenticationRequirements"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json(&body),
        serde_json::json!({
            "BucketList": false,
            "ObjectList": false,
            "ObjectRead": false,
            "ObjectCreate": true,
            "ObjectDelete": true,
        })
    );
}

#[tokio::test]
async fn multipart_upload_uses_part_name_and_type() {
    let (_dir, app) = test_app(AuthRequirements::open());
    let boundary = "XBOUNDARYX";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"report.pdf\"\r\n\
         Content-Type: application/pdf\r\n\r\n\
         %PDF-1.7\r\n\
         --{boundary}--\r\n"
    );
    let req = Request::builder()
        .method(Method::PUT)
        .uri("/Bucket/reports")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let id = json(&body).as_str().unwrap().to_string();

    let (status, headers, body) =
        send(&app, request(Method::GET, &format!("/Bucket/reports/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"%PDF-1.7");
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(headers["x-buckets-object-name"], "report.pdf");
}

#[tokio::test]
async fn multipart_without_file_part_is_bad_request() {
    let (_dir, app) = test_app(AuthRequirements::open());
    let boundary = "XBOUNDARYX";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"other\"\r\n\r\n\
         ignored\r\n\
         --{boundary}--\r\n"
    );
    let req = Request::builder()
        .method(Method::PUT)
        .uri("/Bucket/reports")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, _, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn overrides_and_defaults_for_name_and_mime() {
    let (_dir, app) = test_app(AuthRequirements::open());

    let req = put_raw(
        "/Bucket/b?nameOverride=renamed.txt&mimeOverride=text%2Fmarkdown",
        "text/plain",
        b"# hi",
    );
    let (_, _, body) = send(&app, req).await;
    let id = json(&body).as_str().unwrap().to_string();
    let (_, headers, _) = send(&app, request(Method::HEAD, &format!("/Bucket/b/{id}"))).await;
    assert_eq!(headers[header::CONTENT_TYPE], "text/markdown");
    assert_eq!(headers["x-buckets-object-name"], "renamed.txt");

    let req = Request::builder()
        .method(Method::PUT)
        .uri("/Bucket/b")
        .body(Body::from("raw"))
        .unwrap();
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let id = json(&body).as_str().unwrap().to_string();
    let (_, headers, _) = send(&app, request(Method::HEAD, &format!("/Bucket/b/{id}"))).await;
    assert_eq!(headers[header::CONTENT_TYPE], "application/octet-stream");
    assert!(!headers["x-buckets-object-name"].is_empty());
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let (dir, app) = test_app_with_limit(AuthRequirements::open(), 16);
    let (status, _, _) = send(&app, put_raw("/Bucket/b", "text/plain", &[0u8; 64])).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(!dir.path().join("b").exists());
}

#[tokio::test]
async fn integrity_fault_is_a_generic_server_error() {
    let (dir, app) = test_app(AuthRequirements::open());
    let id = create(&app, "b", "text/plain", "n", b"x").await;
    std::fs::remove_file(dir.path().join("b").join(format!("{id}.bktobj"))).unwrap();

    let (status, _, body) = send(&app, request(Method::GET, &format!("/Bucket/b/{id}"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = json(&body);
    assert_eq!(body["error"], true);
    assert!(!body["message"].as_str().unwrap().contains(&id));
}

#[tokio::test]
async fn health_probes() {
    let (_dir, app) = test_app(AuthRequirements::requiring(OperationKind::ALL));

    let (status, _, body) = send(&app, request(Method::GET, "/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "ok");

    let (status, _, body) = send(&app, request(Method::GET, "/readyz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["checks"]["disk"]["ok"], true);
}

#[tokio::test]
async fn bucket_named_list_is_writable_and_readable() {
    let (_dir, app) = test_app(AuthRequirements::open());

    let (status, _, body) = send(&app, put_raw("/Bucket/List", "text/plain", b"listed")).await;
    assert_eq!(status, StatusCode::OK);
    let id = json(&body).as_str().expect("id is a JSON string").to_string();

    let (status, headers, body) =
        send(&app, request(Method::GET, &format!("/Bucket/List/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"listed");
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");

    let (status, _, body) = send(&app, request(Method::GET, "/Bucket/List")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), serde_json::json!(["List"]));
}

#[tokio::test]
async fn upload_into_list_bucket_is_still_gated() {
    let (_dir, app) = test_app(AuthRequirements::requiring([OperationKind::ObjectCreate]));
    let (status, _, body) = send(&app, put_raw("/Bucket/List", "text/plain", b"x")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json(&body)["message"], "No Authorization header provided");
}

#[tokio::test]
async fn authentication_requirements_served_at_both_paths() {
    let (_dir, app) = test_app(AuthRequirements::requiring([OperationKind::ObjectRead]));

    let (_, _, system) = send(
        &app,
        request(Method::GET, "/System/AuthenticationRequirements"),
    )
    .await;
    let (status, _, short) = send(&app, request(Method::GET, "/AuthenticationRequirements")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&short), json(&system));
    assert_eq!(json(&short)["ObjectRead"], true);
}
