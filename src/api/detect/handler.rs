// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detect endpoint handler

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use axum_extra::extract::Multipart;
use std::time::Instant;
use tracing::info;

use super::response::DetectResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::storage::FileStore;
use crate::vision::{self, DetectionDocument};

/// POST /detect - Run object detection on one uploaded image
///
/// Accepts a multipart upload with one file field whose declared
/// content type must begin with `image`. Persists the upload, runs
/// YOLOv8n inference, writes `<stem>.json` and `<stem>_annotated.jpg`
/// to the outputs directory, and returns the two filenames with the
/// detections inline.
pub async fn detect_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<DetectResponse>, ApiError> {
    let started = Instant::now();

    let (file_name, content_type, data) = read_file_field(multipart).await?;

    // Declared content type gates everything; nothing is written for
    // non-image uploads.
    if !content_type.starts_with("image") {
        return Err(ApiError::not_an_image());
    }

    let saved_name = state.store.save_upload(&file_name, &data).await?;
    let stem = FileStore::stem(&saved_name);

    let detector = state
        .detector
        .read()
        .await
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable("Detection model not loaded".to_string()))?;

    let (image, image_info) = vision::decode_image_bytes(&data)
        .map_err(|e| ApiError::InternalError(format!("Failed to decode image: {}", e)))?;

    // Synchronous CPU inference; concurrent requests serialize on the
    // session mutex.
    let detections = detector.detect(&image)?;

    let document = DetectionDocument {
        input_image: saved_name.clone(),
        detections,
    };
    let json_file = state.store.write_detection_json(&stem, &document).await?;

    let annotated = vision::render_annotated(&image, &document.detections, state.label_font());
    let jpeg = vision::encode_jpeg(&annotated)?;
    let annotated_image = state.store.write_annotated_jpeg(&stem, &jpeg).await?;

    info!(
        "📦 Detected {} objects in {} ({}x{}, {} ms)",
        document.detections.len(),
        saved_name,
        image_info.width,
        image_info.height,
        started.elapsed().as_millis()
    );

    Ok(Json(DetectResponse::success(
        json_file,
        annotated_image,
        document.detections,
    )))
}

/// Pull the first file field out of the multipart body
///
/// Returns (filename, declared content type, bytes). A body with no
/// file field gets the same 400 as a non-image upload.
async fn read_file_field(mut multipart: Multipart) -> Result<(String, String, Bytes), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.file_name().is_none() {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().unwrap_or("").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to read upload: {}", e)))?;
        return Ok((file_name, content_type, data));
    }

    Err(ApiError::not_an_image())
}
