// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Detect endpoint tests for POST /detect
//!
//! These tests verify the upload contract without a model present:
//! - non-image content types are rejected with 400 and write no files
//! - a missing file field gets the same 400
//! - image uploads are persisted before inference, then 503 when the
//!   model is not loaded
//! - client-supplied path components cannot escape the uploads dir

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use fabstir_vision_node::api::{create_app, AppState, ErrorDetail};
use fabstir_vision_node::storage::FileStore;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

const BOUNDARY: &str = "fabstir-test-boundary";

/// Helper: create test AppState over a temp directory pair
fn setup_state() -> (TempDir, AppState) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = FileStore::new(dir.path().join("uploads"), dir.path().join("outputs"))
        .expect("Failed to create file store");
    (dir, AppState::new(store))
}

/// Helper: build a single-field multipart body
fn multipart_body(file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn detect_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/detect")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn response_detail(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice::<ErrorDetail>(&bytes).unwrap().detail
}

fn dir_entries(path: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(path)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod detect_handler_tests {
    use super::*;

    /// Non-image content type: 400 with the contract detail message
    #[tokio::test]
    async fn test_non_image_upload_rejected() {
        let (dir, state) = setup_state();
        let app = create_app(state);

        let body = multipart_body("notes.txt", "text/plain", b"not an image");
        let response = app.oneshot(detect_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_detail(response).await, "Upload an image file.");

        // Nothing was written for the rejected upload
        assert!(dir_entries(&dir.path().join("uploads")).is_empty());
        assert!(dir_entries(&dir.path().join("outputs")).is_empty());
    }

    /// A multipart body with no file field gets the same 400
    #[tokio::test]
    async fn test_missing_file_field_rejected() {
        let (_dir, state) = setup_state();
        let app = create_app(state);

        // One plain (non-file) field only
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"comment\"\r\n\r\n");
        body.extend_from_slice(b"hello");
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        let response = app.oneshot(detect_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_detail(response).await, "Upload an image file.");
    }

    /// Image uploads persist before inference; without a loaded model
    /// the request then fails 503
    #[tokio::test]
    async fn test_image_upload_without_model_is_unavailable() {
        let (dir, state) = setup_state();
        let app = create_app(state);

        let body = multipart_body("cat.jpg", "image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0]);
        let response = app.oneshot(detect_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        // The upload landed on disk, no outputs were produced
        assert_eq!(dir_entries(&dir.path().join("uploads")), vec!["cat.jpg"]);
        assert!(dir_entries(&dir.path().join("outputs")).is_empty());
    }

    /// Path components in the client filename are stripped before use
    #[tokio::test]
    async fn test_traversal_filename_stays_inside_uploads() {
        let (dir, state) = setup_state();
        let app = create_app(state);

        let body = multipart_body("../../escape.jpg", "image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0]);
        let response = app.oneshot(detect_request(body)).await.unwrap();

        // Still progresses to the model-missing error, not a write outside
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(dir_entries(&dir.path().join("uploads")), vec!["escape.jpg"]);
        assert!(!dir.path().join("escape.jpg").exists());
        assert!(!dir.path().parent().unwrap().join("escape.jpg").exists());
    }

    /// GET is not accepted on the detect route
    #[tokio::test]
    async fn test_detect_rejects_get() {
        let (_dir, state) = setup_state();
        let app = create_app(state);

        let request = Request::builder()
            .method(Method::GET)
            .uri("/detect")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
