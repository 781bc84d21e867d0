// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Output file server tests for GET /outputs/{file_name}

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use fabstir_vision_node::api::{create_app, AppState, ErrorDetail};
use fabstir_vision_node::storage::FileStore;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

/// Helper: create test AppState over a temp directory pair
fn setup_state() -> (TempDir, AppState) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = FileStore::new(dir.path().join("uploads"), dir.path().join("outputs"))
        .expect("Failed to create file store");
    (dir, AppState::new(store))
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

#[cfg(test)]
mod outputs_handler_tests {
    use super::*;

    /// Existing output files are served back byte for byte
    #[tokio::test]
    async fn test_serves_existing_json_file() {
        let (dir, state) = setup_state();
        let content = br#"{"input_image":"cat.jpg","detections":[]}"#;
        std::fs::write(dir.path().join("outputs").join("cat.json"), content).unwrap();

        let app = create_app(state);
        let response = app.oneshot(get_request("/outputs/cat.json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(body_bytes(response).await, content);
    }

    /// Annotated images come back with an image content type
    #[tokio::test]
    async fn test_serves_annotated_image_as_jpeg() {
        let (dir, state) = setup_state();
        std::fs::write(
            dir.path().join("outputs").join("cat_annotated.jpg"),
            [0xFF, 0xD8, 0xFF, 0xD9],
        )
        .unwrap();

        let app = create_app(state);
        let response = app
            .oneshot(get_request("/outputs/cat_annotated.jpg"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/jpeg"
        );
    }

    /// Missing files are a 404 with the contract detail message
    #[tokio::test]
    async fn test_missing_file_is_404() {
        let (_dir, state) = setup_state();
        let app = create_app(state);

        let response = app
            .oneshot(get_request("/outputs/nonexistent.json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = body_bytes(response).await;
        let detail: ErrorDetail = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(detail.detail, "File not found");
    }

    /// Encoded traversal segments cannot reach files outside outputs/
    #[tokio::test]
    async fn test_encoded_traversal_cannot_escape() {
        let (dir, state) = setup_state();
        // A sibling of outputs/ that must stay unreachable
        std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();

        let app = create_app(state);
        let response = app
            .oneshot(get_request("/outputs/%2E%2E%2Fsecret.txt"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    /// Sanitized lookups still find a file of the same final name
    /// inside outputs/ (the component reduction, not a block list)
    #[tokio::test]
    async fn test_traversal_reduces_to_final_component() {
        let (dir, state) = setup_state();
        std::fs::write(dir.path().join("outputs").join("cat.json"), b"{}").unwrap();

        let app = create_app(state);
        let response = app
            .oneshot(get_request("/outputs/%2E%2E%2Foutputs%2Fcat.json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
