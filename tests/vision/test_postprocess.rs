// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Postprocessing tests against synthetic model output
//!
//! The model output layout is [features, anchors] with rows 0..4
//! holding cx, cy, w, h in input space and rows 4.. holding class
//! scores. These tests build small synthetic tensors instead of
//! running the real model.

use fabstir_vision_node::vision::{postprocess, LetterboxParams};
use ndarray::Array2;

const FEATURES: usize = 84; // 4 box coords + 80 classes

fn identity_params() -> LetterboxParams {
    LetterboxParams {
        ratio: 1.0,
        pad_x: 0.0,
        pad_y: 0.0,
    }
}

/// Synthetic output with the given anchors: (cx, cy, w, h, class_id, score)
fn synthetic_output(anchors: &[(f32, f32, f32, f32, usize, f32)]) -> Array2<f32> {
    let mut output = Array2::<f32>::zeros((FEATURES, anchors.len()));
    for (a, &(cx, cy, w, h, class_id, score)) in anchors.iter().enumerate() {
        output[[0, a]] = cx;
        output[[1, a]] = cy;
        output[[2, a]] = w;
        output[[3, a]] = h;
        output[[4 + class_id, a]] = score;
    }
    output
}

#[cfg(test)]
mod postprocess_tests {
    use super::*;

    #[test]
    fn test_single_confident_box() {
        let output = synthetic_output(&[(320.0, 320.0, 100.0, 50.0, 15, 0.9)]);
        let detections = postprocess(output.view(), &identity_params(), 640, 640, 0.25, 0.45);

        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert_eq!(det.class_id, 15);
        assert_eq!(det.class_name, "cat");
        assert_eq!(det.confidence, 0.9);
        assert_eq!(det.bbox_xyxy, [270.0, 295.0, 370.0, 345.0]);
    }

    #[test]
    fn test_below_threshold_is_dropped() {
        let output = synthetic_output(&[(320.0, 320.0, 100.0, 50.0, 0, 0.1)]);
        let detections = postprocess(output.view(), &identity_params(), 640, 640, 0.25, 0.45);
        assert!(detections.is_empty());
    }

    #[test]
    fn test_nms_suppresses_overlapping_box() {
        let output = synthetic_output(&[
            (320.0, 320.0, 100.0, 100.0, 15, 0.9),
            // Nearly the same box, lower confidence: suppressed
            (322.0, 321.0, 100.0, 100.0, 15, 0.8),
            // Far away box: kept
            (100.0, 100.0, 40.0, 40.0, 0, 0.7),
        ]);
        let detections = postprocess(output.view(), &identity_params(), 640, 640, 0.25, 0.45);

        assert_eq!(detections.len(), 2);
        // Sorted highest confidence first
        assert_eq!(detections[0].confidence, 0.9);
        assert_eq!(detections[1].class_name, "person");
    }

    #[test]
    fn test_letterbox_mapping_back_to_original() {
        // 1280x640 original, scaled by 0.5 into 640x640 with 160px
        // vertical padding
        let params = LetterboxParams {
            ratio: 0.5,
            pad_x: 0.0,
            pad_y: 160.0,
        };
        let output = synthetic_output(&[(320.0, 320.0, 100.0, 100.0, 2, 0.6)]);
        let detections = postprocess(output.view(), &params, 1280, 640, 0.25, 0.45);

        assert_eq!(detections.len(), 1);
        // (320 +/- 50 - pad) / ratio
        assert_eq!(detections[0].bbox_xyxy, [540.0, 220.0, 740.0, 420.0]);
    }

    #[test]
    fn test_boxes_clamped_to_image_bounds() {
        // Box hanging over the top-left corner
        let output = synthetic_output(&[(10.0, 10.0, 60.0, 60.0, 0, 0.8)]);
        let detections = postprocess(output.view(), &identity_params(), 640, 640, 0.25, 0.45);

        assert_eq!(detections.len(), 1);
        let [x1, y1, x2, y2] = detections[0].bbox_xyxy;
        assert_eq!(x1, 0.0);
        assert_eq!(y1, 0.0);
        assert!(x1 <= x2 && y1 <= y2);
        assert!(x2 <= 640.0 && y2 <= 640.0);
    }

    #[test]
    fn test_confidence_rounding_and_range() {
        let output = synthetic_output(&[(320.0, 320.0, 100.0, 100.0, 7, 0.87654)]);
        let detections = postprocess(output.view(), &identity_params(), 640, 640, 0.25, 0.45);

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence, 0.8765);
        assert!(detections[0].confidence >= 0.0 && detections[0].confidence <= 1.0);
    }

    #[test]
    fn test_degenerate_boxes_are_dropped() {
        let output = synthetic_output(&[
            (320.0, 320.0, 0.0, 50.0, 0, 0.9),
            (320.0, 320.0, -10.0, 50.0, 0, 0.9),
        ]);
        let detections = postprocess(output.view(), &identity_params(), 640, 640, 0.25, 0.45);
        assert!(detections.is_empty());
    }

    #[test]
    fn test_empty_output() {
        let output = Array2::<f32>::zeros((FEATURES, 0));
        let detections = postprocess(output.view(), &identity_params(), 640, 640, 0.25, 0.45);
        assert!(detections.is_empty());
    }
}
