// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detect endpoint response types

use serde::{Deserialize, Serialize};

use crate::vision::Detection;

/// Response for a successful detection run
///
/// `json_file` and `annotated_image` are filenames under the outputs
/// directory, fetchable through `GET /outputs/{file_name}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectResponse {
    pub message: String,
    pub json_file: String,
    pub annotated_image: String,
    pub detections: Vec<Detection>,
}

impl DetectResponse {
    pub fn success(
        json_file: String,
        annotated_image: String,
        detections: Vec<Detection>,
    ) -> Self {
        Self {
            message: "success".to_string(),
            json_file,
            annotated_image,
            detections,
        }
    }
}
