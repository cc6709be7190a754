mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use common::{multipart_content_type, Form, Harness, CONTAINER};
use fineup_axum::{FINE_UPLOAD_LEGACY_PATH, FINE_UPLOAD_PATH};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

async fn post(router: Router, uri: &str, body: Vec<u8>) -> Response {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, multipart_content_type())
        .body(Body::from(body))
        .unwrap();
    router.oneshot(req).await.unwrap()
}

async fn body_bytes(res: Response) -> Vec<u8> {
    res.into_body().collect().await.unwrap().to_bytes().to_vec()
}

fn content_type(res: &Response) -> &str {
    res.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn json_endpoint_reports_success() {
    let h = Harness::new().await;
    let form = Form::new()
        .file("qqfile", "kitten", b"meow")
        .text("myagent", "test-agent/1.0")
        .build();

    let res = post(h.app().router, FINE_UPLOAD_PATH, form).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(content_type(&res), "application/json");
    let body = body_bytes(res).await;
    assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        r#"{"success":true,"error":null,"preventRetry":false,"fileName":"kitten.jpg","echoAgent":"test-agent/1.0"}"#
    );
    assert!(h.store.object(CONTAINER, "kitten.jpg").is_some());
}

#[tokio::test]
async fn legacy_endpoint_serves_same_body_as_text() {
    let h = Harness::new().await;
    let form = || Form::new().file("qqfile", "kitten", b"meow").build();

    let json = post(h.app().router, FINE_UPLOAD_PATH, form()).await;
    let text = post(h.app().router, FINE_UPLOAD_LEGACY_PATH, form()).await;

    assert_eq!(text.status(), StatusCode::OK);
    assert_eq!(content_type(&text), "text/plain; charset=utf-8");
    assert_eq!(body_bytes(json).await, body_bytes(text).await);
}

#[tokio::test]
async fn failure_is_still_200_on_both_endpoints() {
    let h = Harness::new().await;
    h.store.fail_commits("storage down");

    for uri in [FINE_UPLOAD_PATH, FINE_UPLOAD_LEGACY_PATH] {
        let form = Form::new().file("qqfile", "kitten", b"meow").build();
        let res = post(h.app().router, uri, form).await;
        assert_eq!(res.status(), StatusCode::OK);

        let value: Value = serde_json::from_slice(&body_bytes(res).await).unwrap();
        assert_eq!(value["success"], Value::Bool(false));
        assert_eq!(value["preventRetry"], Value::Bool(false));
        assert!(value["error"].as_str().unwrap().contains("storage down"));
        assert_eq!(value["fileName"], Value::String("kitten.jpg".into()));
        assert_eq!(value["echoAgent"], Value::Null);
    }
    assert_eq!(h.spooled_files(), 0);
}

#[tokio::test]
async fn garbage_body_is_a_failed_upload() {
    let h = Harness::new().await;

    let res = post(h.app().router, FINE_UPLOAD_PATH, b"not multipart at all".to_vec()).await;

    assert_eq!(res.status(), StatusCode::OK);
    let value: Value = serde_json::from_slice(&body_bytes(res).await).unwrap();
    assert_eq!(value["success"], Value::Bool(false));
    assert!(value["error"].is_string());
    assert_eq!(h.store.commit_count(), 0);
}

#[tokio::test]
async fn oversized_body_is_a_failed_upload() {
    let h = Harness::new().await;
    let form = Form::new().file("qqfile", "big", &vec![7u8; 64 * 1024]).build();

    let res = post(h.app_with_body_limit(1024).router, FINE_UPLOAD_PATH, form).await;

    assert_eq!(res.status(), StatusCode::OK);
    let value: Value = serde_json::from_slice(&body_bytes(res).await).unwrap();
    assert_eq!(value["success"], Value::Bool(false));
    assert_eq!(h.store.commit_count(), 0);
    assert_eq!(h.spooled_files(), 0);
}

#[tokio::test]
async fn request_id_is_propagated() {
    let h = Harness::new().await;
    let form = Form::new().file("qqfile", "kitten", b"meow").build();
    let req = Request::builder()
        .method("POST")
        .uri(FINE_UPLOAD_PATH)
        .header(header::CONTENT_TYPE, multipart_content_type())
        .header("x-request-id", "req-1234")
        .body(Body::from(form))
        .unwrap();

    let res = h.app().router.oneshot(req).await.unwrap();

    assert_eq!(res.headers().get("x-request-id").unwrap(), "req-1234");
}

#[tokio::test]
async fn request_id_is_generated_when_absent() {
    let h = Harness::new().await;

    let res = post(h.app().router, FINE_UPLOAD_PATH, Form::new().build()).await;

    let id = res.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn health_check() {
    let h = Harness::new().await;
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let res = h.app().router.oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_bytes(res).await, b"ok");
}

#[tokio::test]
async fn get_on_upload_path_is_not_allowed() {
    let h = Harness::new().await;
    let req = Request::builder().uri(FINE_UPLOAD_PATH).body(Body::empty()).unwrap();

    let res = h.app().router.oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn mixed_case_routes_reach_the_same_handlers() {
    let h = Harness::new().await;
    let form = || Form::new().file("qqfile", "kitten", b"meow").build();

    let json = post(h.app().router, "/api/Photos/FineUpload", form()).await;
    assert_eq!(json.status(), StatusCode::OK);
    assert_eq!(content_type(&json), "application/json");

    let text = post(h.app().router, "/api/Photos/FineUploadIe9", form()).await;
    assert_eq!(text.status(), StatusCode::OK);
    assert_eq!(content_type(&text), "text/plain; charset=utf-8");

    assert_eq!(h.store.commit_count(), 2);
}
