// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Output file server handler

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::storage::FileStore;

/// GET /outputs/{file_name} - Serve saved output files
///
/// Returns the file's bytes with a content type guessed from its
/// extension, or 404 `{"detail": "File not found"}` when absent. The
/// name is reduced to its final path component before lookup, so
/// requests cannot escape the outputs directory.
pub async fn get_output_handler(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = state
        .store
        .read_output(&file_name)
        .await?
        .ok_or_else(ApiError::file_not_found)?;

    let content_type = FileStore::content_type_for(&file_name);
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}
