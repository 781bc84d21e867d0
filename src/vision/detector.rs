// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLOv8n ONNX detector
//!
//! This module wraps ONNX Runtime for single-image object detection:
//! - model loading from disk (CPU execution provider)
//! - 640x640 letterboxed preprocessing
//! - confidence filtering + greedy IoU NMS postprocessing
//! - mapping boxes back into original image coordinates
//!
//! The session runs on CPU and is shared behind a mutex, so concurrent
//! requests serialize on inference.

use anyhow::{Context, Result};
use image::{imageops::FilterType, DynamicImage, Rgb, RgbImage};
use ndarray::{Array4, ArrayView2, Axis, Ix3};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;

use super::labels;

/// Human-readable model name reported by /health and the client
pub const MODEL_NAME: &str = "YOLOv8n";

/// Fixed model input resolution (square)
pub const INPUT_SIZE: u32 = 640;

/// Letterbox padding gray value
const PAD_VALUE: u8 = 114;

/// Custom error types for detection
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Inference failed: {0}")]
    Inference(#[from] ort::Error),

    #[error("Invalid model output shape: {0}")]
    OutputShape(String),

    #[error("Model session lock poisoned")]
    SessionPoisoned,

    #[error("Failed to encode annotated image: {0}")]
    EncodeFailed(String),
}

/// One predicted object instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Model class id
    pub class_id: u32,
    /// Human-readable class name from the COCO label table
    pub class_name: String,
    /// Confidence in [0, 1], rounded to 4 decimals
    pub confidence: f32,
    /// Corner coordinates [x1, y1, x2, y2] in original image space,
    /// rounded to 2 decimals, x1 <= x2 and y1 <= y2
    pub bbox_xyxy: [f32; 4],
}

/// Letterbox mapping from original image space into model input space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxParams {
    /// Uniform scale applied to the original image
    pub ratio: f32,
    /// Horizontal padding (pixels, input space)
    pub pad_x: f32,
    /// Vertical padding (pixels, input space)
    pub pad_y: f32,
}

/// Unrounded candidate used internally before NMS
#[derive(Debug, Clone)]
struct Candidate {
    class_id: u32,
    confidence: f32,
    bbox: [f32; 4],
}

/// YOLOv8n detector backed by an ONNX Runtime session
///
/// # Thread Safety
/// The session is wrapped in a `Mutex`; inference from concurrent request
/// handlers serializes on it. The rest of the struct is immutable after
/// construction.
pub struct YoloDetector {
    /// ONNX Runtime session
    session: Mutex<Session>,

    /// Confidence threshold in [0, 1]
    conf_threshold: f32,

    /// NMS IoU threshold in [0, 1]
    iou_threshold: f32,
}

impl std::fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloDetector")
            .field("model_name", &MODEL_NAME)
            .field("input_size", &INPUT_SIZE)
            .field("conf_threshold", &self.conf_threshold)
            .field("iou_threshold", &self.iou_threshold)
            .finish_non_exhaustive()
    }
}

impl YoloDetector {
    /// Loads the YOLOv8n ONNX model from disk
    ///
    /// # Arguments
    /// - `model_path`: Path to the ONNX model file (yolov8n.onnx)
    /// - `conf_threshold`: Minimum confidence for kept detections
    /// - `iou_threshold`: IoU threshold for non-maximum suppression
    ///
    /// # Errors
    /// Returns an error if the model file is missing or ONNX Runtime
    /// fails to initialize the session.
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        conf_threshold: f32,
        iou_threshold: f32,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("ONNX model file not found: {}", model_path.display());
        }

        info!("🧠 Loading {} model from {}", MODEL_NAME, model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load ONNX model from {}",
                model_path.display()
            ))?;

        info!("✅ {} model loaded", MODEL_NAME);

        Ok(Self {
            session: Mutex::new(session),
            conf_threshold,
            iou_threshold,
        })
    }

    /// Runs detection on one image
    ///
    /// Returns detections in original image coordinates, highest
    /// confidence first.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>, VisionError> {
        let (input, params) = preprocess_image(image, INPUT_SIZE);
        let (orig_w, orig_h) = (image.width(), image.height());

        let mut session = self.session.lock().map_err(|_| VisionError::SessionPoisoned)?;
        let outputs = session.run(ort::inputs!["images" => Value::from_array(input)?])?;

        // Index [0] instead of name since exported models vary between
        // "output0" and "output"
        let output = outputs[0].try_extract_array::<f32>()?;
        let output = output
            .into_dimensionality::<Ix3>()
            .map_err(|e| VisionError::OutputShape(e.to_string()))?;

        // Expected [1, 84, 8400]; tolerate the transposed export
        let view = output.index_axis(Axis(0), 0);
        let view = if view.shape()[0] > view.shape()[1] {
            view.reversed_axes()
        } else {
            view
        };

        if view.shape()[0] < 5 {
            return Err(VisionError::OutputShape(format!(
                "expected at least 5 output features, got {}",
                view.shape()[0]
            )));
        }

        Ok(postprocess(
            view,
            &params,
            orig_w,
            orig_h,
            self.conf_threshold,
            self.iou_threshold,
        ))
    }
}

/// Letterbox an image into a square model input tensor
///
/// The image is scaled uniformly to fit, centered on a gray canvas, and
/// normalized to [0, 1] RGB planes in NCHW order.
pub fn preprocess_image(image: &DynamicImage, input_size: u32) -> (Array4<f32>, LetterboxParams) {
    let rgb = image.to_rgb8();
    let (orig_w, orig_h) = (rgb.width() as f32, rgb.height() as f32);

    let ratio = (input_size as f32 / orig_w).min(input_size as f32 / orig_h);
    let new_w = ((orig_w * ratio).round() as u32).max(1);
    let new_h = ((orig_h * ratio).round() as u32).max(1);
    let pad_x = (input_size as f32 - new_w as f32) / 2.0;
    let pad_y = (input_size as f32 - new_h as f32) / 2.0;

    let resized = image::imageops::resize(&rgb, new_w, new_h, FilterType::Triangle);

    let mut canvas = RgbImage::from_pixel(input_size, input_size, Rgb([PAD_VALUE; 3]));
    image::imageops::overlay(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    let mut input = Array4::<f32>::zeros((1, 3, input_size as usize, input_size as usize));
    for (x, y, pixel) in canvas.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        input[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
        input[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
        input[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
    }

    (
        input,
        LetterboxParams {
            ratio,
            pad_x,
            pad_y,
        },
    )
}

/// Turn raw model output into detections in original image space
///
/// `output` is `[features, anchors]` with rows 0..4 holding cx, cy, w, h
/// in input space and rows 4.. holding per-class scores (YOLOv8 has no
/// separate objectness score). Detections are confidence-filtered,
/// NMS-suppressed, un-letterboxed, clamped to image bounds and rounded
/// for serialization.
pub fn postprocess(
    output: ArrayView2<f32>,
    params: &LetterboxParams,
    orig_w: u32,
    orig_h: u32,
    conf_threshold: f32,
    iou_threshold: f32,
) -> Vec<Detection> {
    let anchors = output.shape()[1];
    let num_classes = output.shape()[0] - 4;

    let mut candidates = Vec::new();
    for a in 0..anchors {
        // Best class score is the confidence
        let (mut best_cls, mut best_score) = (0usize, f32::NEG_INFINITY);
        for c in 0..num_classes {
            let score = output[[4 + c, a]];
            if score > best_score {
                best_cls = c;
                best_score = score;
            }
        }

        if !best_score.is_finite() || best_score < conf_threshold {
            continue;
        }

        let (cx, cy, w, h) = (
            output[[0, a]],
            output[[1, a]],
            output[[2, a]],
            output[[3, a]],
        );
        if !(cx.is_finite() && cy.is_finite() && w.is_finite() && h.is_finite()) {
            continue;
        }
        if w <= 0.0 || h <= 0.0 {
            continue;
        }

        // Undo letterbox: input space -> original image space
        let x1 = (cx - w / 2.0 - params.pad_x) / params.ratio;
        let y1 = (cy - h / 2.0 - params.pad_y) / params.ratio;
        let x2 = (cx + w / 2.0 - params.pad_x) / params.ratio;
        let y2 = (cy + h / 2.0 - params.pad_y) / params.ratio;

        let x1 = x1.clamp(0.0, orig_w as f32);
        let y1 = y1.clamp(0.0, orig_h as f32);
        let x2 = x2.clamp(0.0, orig_w as f32);
        let y2 = y2.clamp(0.0, orig_h as f32);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        candidates.push(Candidate {
            class_id: best_cls as u32,
            confidence: best_score.min(1.0),
            bbox: [x1, y1, x2, y2],
        });
    }

    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    non_maximum_suppression(candidates, iou_threshold)
        .into_iter()
        .map(|c| Detection {
            class_id: c.class_id,
            class_name: labels::class_name(c.class_id).to_string(),
            confidence: round_to(c.confidence, 4),
            bbox_xyxy: c.bbox.map(|v| round_to(v, 2)),
        })
        .collect()
}

/// Greedy IoU suppression over confidence-sorted candidates
///
/// Matches the original behavior of suppressing across all classes.
fn non_maximum_suppression(candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len().min(100));

    'outer: for candidate in candidates {
        for k in &kept {
            if iou(&candidate.bbox, &k.bbox) > iou_threshold {
                continue 'outer;
            }
        }
        kept.push(candidate);
    }

    kept
}

/// Intersection-over-union of two xyxy boxes
fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_x1 = a[0].max(b[0]);
    let inter_y1 = a[1].max(b[1]);
    let inter_x2 = a[2].min(b[2]);
    let inter_y2 = a[3].min(b[3]);

    let inter = (inter_x2 - inter_x1).max(0.0) * (inter_y2 - inter_y1).max(0.0);
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;

    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Round to a fixed number of decimal places for serialization
fn round_to(value: f32, places: i32) -> f32 {
    let factor = 10f32.powi(places);
    (value * factor).round() / factor
}
