// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module for CPU-based object detection
//!
//! This module provides:
//! - YOLOv8n inference via ONNX Runtime (CPU only)
//! - letterboxed preprocessing and NMS postprocessing
//! - annotated image rendering for detection outputs

pub mod annotate;
pub mod detector;
pub mod image_utils;
pub mod labels;

use serde::{Deserialize, Serialize};

pub use annotate::{encode_jpeg, load_label_font, render_annotated};
pub use detector::{
    postprocess, preprocess_image, Detection, LetterboxParams, VisionError, YoloDetector,
    INPUT_SIZE, MODEL_NAME,
};
pub use image_utils::{decode_image_bytes, detect_format, ImageError, ImageInfo, MAX_IMAGE_SIZE};
pub use labels::{class_name, COCO_CLASSES};

/// Document written to `outputs/<stem>.json` after a detection run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionDocument {
    /// Original upload filename
    pub input_image: String,
    /// Detections in the order they were kept
    pub detections: Vec<Detection>,
}
