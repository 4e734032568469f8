mod common;

use common::*;
use mesh_relay::gateway::error::ErrorResponse;
use reqwest::StatusCode;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn post_upload(gateway: &str, form: reqwest::multipart::Form) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/api/upload", gateway))
        .multipart(form)
        .send()
        .await
        .unwrap()
}

async fn error_body(response: reqwest::Response) -> ErrorResponse {
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_valid_png_is_relayed_verbatim() {
    let backend = MockServer::start().await;
    let artifact = b"# OBJ\nv 0.0 1.0 0.0\n\xFF\x00binary-tail".to_vec();
    Mock::given(method("POST"))
        .and(path("/process"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(artifact.clone(), "model/obj"))
        .expect(1)
        .mount(&backend)
        .await;
    let gateway = spawn_gateway(config_for(format!("{}/process", backend.uri()))).await;

    let response = post_upload(&gateway, file_form("cell.png", "image/png", PNG_BYTES)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/octet-stream");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"model.obj\""
    );
    assert_eq!(response.bytes().await.unwrap().to_vec(), artifact);

    // The backend saw the same field, filename, type and bytes.
    let received = backend.received_requests().await.unwrap();
    let body = &received[0].body;
    let text = String::from_utf8_lossy(body);
    assert!(text.contains(r#"name="file"; filename="cell.png""#));
    assert!(text.contains("Content-Type: image/png"));
    assert!(contains(body, PNG_BYTES));
}

#[tokio::test]
async fn test_wrong_media_type_never_reaches_backend() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;
    let gateway = spawn_gateway(config_for(format!("{}/process", backend.uri()))).await;

    for media_type in ["image/jpeg", "image/PNG", "text/plain", "application/octet-stream"] {
        let response =
            post_upload(&gateway, file_form("diagram.jpg", media_type, b"\xFF\xD8\xFF")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", media_type);
        assert_eq!(
            error_body(response).await,
            ErrorResponse::new("Only PNG files are allowed")
        );
    }
}

#[tokio::test]
async fn test_file_field_count_must_be_one() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;
    let gateway = spawn_gateway(config_for(format!("{}/process", backend.uri()))).await;

    let two_files = reqwest::multipart::Form::new()
        .part("file", file_part("a.png", "image/png", PNG_BYTES))
        .part("file", file_part("b.png", "image/png", PNG_BYTES));
    let response = post_upload(&gateway, two_files).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let wrong_field = reqwest::multipart::Form::new()
        .text("purpose", "mesh")
        .part("image", file_part("a.png", "image/png", PNG_BYTES));
    let response = post_upload(&gateway, wrong_field).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let not_multipart = reqwest::Client::new()
        .post(format!("{}/api/upload", gateway))
        .json(&serde_json::json!({ "file": "cell.png" }))
        .send()
        .await
        .unwrap();
    assert_eq!(not_multipart.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_body(not_multipart).await.error, "Only PNG files are allowed");
}

#[tokio::test]
async fn test_extra_text_fields_are_ignored() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mesh".to_vec()))
        .expect(1)
        .mount(&backend)
        .await;
    let gateway = spawn_gateway(config_for(format!("{}/process", backend.uri()))).await;

    let form = file_form("cell.png", "image/png", PNG_BYTES).text("note", "hello");
    let response = post_upload(&gateway, form).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&response.bytes().await.unwrap()[..], b"mesh");
}

#[tokio::test]
async fn test_backend_error_statuses_become_generic_500() {
    for status in [400u16, 404, 422, 500, 503] {
        let backend = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_string("Traceback: torch.cuda.OutOfMemoryError at /srv/model.py"),
            )
            .mount(&backend)
            .await;
        let gateway = spawn_gateway(config_for(format!("{}/process", backend.uri()))).await;

        let response = post_upload(&gateway, file_form("cell.png", "image/png", PNG_BYTES)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.text().await.unwrap();
        assert_eq!(body, r#"{"error":"Failed to process file"}"#, "backend {}", status);
        assert!(!body.contains("Traceback"));
    }
}

#[tokio::test]
async fn test_backend_unreachable_is_internal_error() {
    let gateway = spawn_gateway(config_for(refused_url())).await;

    let response = post_upload(&gateway, file_form("cell.png", "image/png", PNG_BYTES)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        error_body(response).await,
        ErrorResponse::new("Internal Server Error")
    );
}

#[tokio::test]
async fn test_backend_timeout_is_internal_error() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&backend)
        .await;
    let mut config = config_for(format!("{}/process", backend.uri()));
    config.backend.timeout_secs = 1;
    let gateway = spawn_gateway(config).await;

    let response = post_upload(&gateway, file_form("cell.png", "image/png", PNG_BYTES)).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_body(response).await.error, "Internal Server Error");
}

#[tokio::test]
async fn test_oversized_upload_is_not_forwarded() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;
    let mut config = config_for(format!("{}/process", backend.uri()));
    config.server.max_upload_bytes = 1024;
    let gateway = spawn_gateway(config).await;

    let mut big = PNG_BYTES.to_vec();
    big.resize(8 * 1024, 0);
    // The gateway may answer and close before the rest of the body is read,
    // in which case the client sees a reset instead of the response.
    let result = reqwest::Client::new()
        .post(format!("{}/api/upload", gateway))
        .multipart(file_form("big.png", "image/png", &big))
        .send()
        .await;

    if let Ok(response) = result {
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

#[tokio::test]
async fn test_signature_check_when_enabled() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mesh".to_vec()))
        .expect(1)
        .mount(&backend)
        .await;
    let mut config = config_for(format!("{}/process", backend.uri()));
    config.validation.verify_signature = true;
    let gateway = spawn_gateway(config).await;

    let disguised = post_upload(&gateway, file_form("x.png", "image/png", b"GIF89a....")).await;
    assert_eq!(disguised.status(), StatusCode::BAD_REQUEST);

    let real = post_upload(&gateway, file_form("cell.png", "image/png", PNG_BYTES)).await;
    assert_eq!(real.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_same_file_twice_gives_independent_relays() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(EchoArtifact::immediate())
        .expect(2)
        .mount(&backend)
        .await;
    let gateway = spawn_gateway(config_for(format!("{}/process", backend.uri()))).await;

    let first = post_upload(&gateway, file_form("cell.png", "image/png", PNG_BYTES)).await;
    let second = post_upload(&gateway, file_form("cell.png", "image/png", PNG_BYTES)).await;

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    let first = first.bytes().await.unwrap();
    let second = second.bytes().await.unwrap();
    assert!(first.starts_with(b"OBJ:") && contains(&first, PNG_BYTES));
    assert!(second.starts_with(b"OBJ:") && contains(&second, PNG_BYTES));
    // Each echo carries its own multipart boundary, so the two bodies differ.
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_concurrent_uploads_get_their_own_artifacts() {
    const N: usize = 8;
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(EchoArtifact::slow())
        .expect(N as u64)
        .mount(&backend)
        .await;
    let gateway = spawn_gateway(config_for(format!("{}/process", backend.uri()))).await;

    let uploads = (0..N).map(|i| {
        let gateway = gateway.clone();
        tokio::spawn(async move {
            let mut payload = PNG_BYTES.to_vec();
            payload.extend_from_slice(format!("upload-marker-{:02}", i).as_bytes());
            let response =
                post_upload(&gateway, file_form(&format!("cell{}.png", i), "image/png", &payload)).await;
            assert_eq!(response.status(), StatusCode::OK);
            (i, response.bytes().await.unwrap())
        })
    });

    for upload in uploads.collect::<Vec<_>>() {
        let (i, body) = upload.await.unwrap();
        for j in 0..N {
            let marker = format!("upload-marker-{:02}", j);
            assert_eq!(contains(&body, marker.as_bytes()), i == j, "upload {} saw marker {}", i, j);
        }
    }
}

#[tokio::test]
async fn test_health() {
    let gateway = spawn_gateway(config_for(refused_url())).await;

    let response = reqwest::get(format!("{}/api/health", gateway)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}
