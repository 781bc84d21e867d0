// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Annotated image rendering
//!
//! Burns detection boxes and class labels into a copy of the input
//! image. Label text needs a font file on disk (LABEL_FONT_PATH); when
//! none is configured the boxes get a small color tab instead of text.

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::warn;

use super::detector::{Detection, VisionError};

/// Per-class box colors, indexed by class_id modulo table size
const PALETTE: [Rgb<u8>; 10] = [
    Rgb([255, 56, 56]),
    Rgb([255, 157, 151]),
    Rgb([255, 112, 31]),
    Rgb([255, 178, 29]),
    Rgb([72, 249, 10]),
    Rgb([26, 147, 52]),
    Rgb([61, 219, 134]),
    Rgb([0, 212, 187]),
    Rgb([44, 153, 168]),
    Rgb([52, 69, 147]),
];

/// Label text scale in pixels
const LABEL_SCALE: f32 = 14.0;

/// JPEG quality for annotated outputs
const JPEG_QUALITY: u8 = 90;

/// Color for a class id
fn class_color(class_id: u32) -> Rgb<u8> {
    PALETTE[class_id as usize % PALETTE.len()]
}

/// Try to load the label font, logging a warning on failure
pub fn load_label_font(path: Option<&Path>) -> Option<FontVec> {
    let path = path?;
    match std::fs::read(path) {
        Ok(bytes) => match FontVec::try_from_vec(bytes) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!("⚠️  Could not parse label font {}: {}", path.display(), e);
                None
            }
        },
        Err(e) => {
            warn!("⚠️  Could not read label font {}: {}", path.display(), e);
            None
        }
    }
}

/// Render detections onto a copy of the input image
///
/// Draws one 2px hollow rectangle per detection plus a label
/// (class name and confidence) when a font is available.
pub fn render_annotated(
    image: &DynamicImage,
    detections: &[Detection],
    font: Option<&FontVec>,
) -> RgbImage {
    let mut canvas = image.to_rgb8();
    let (img_w, img_h) = (canvas.width() as i32, canvas.height() as i32);

    for det in detections {
        let color = class_color(det.class_id);
        let [x1, y1, x2, y2] = det.bbox_xyxy;
        let x1 = (x1 as i32).clamp(0, img_w - 1);
        let y1 = (y1 as i32).clamp(0, img_h - 1);
        let x2 = (x2 as i32).clamp(0, img_w - 1);
        let y2 = (y2 as i32).clamp(0, img_h - 1);
        let w = ((x2 - x1).max(1)) as u32;
        let h = ((y2 - y1).max(1)) as u32;

        // 2px box: outer rect plus a 1px inset
        draw_hollow_rect_mut(&mut canvas, Rect::at(x1, y1).of_size(w, h), color);
        if w > 2 && h > 2 {
            draw_hollow_rect_mut(
                &mut canvas,
                Rect::at(x1 + 1, y1 + 1).of_size(w - 2, h - 2),
                color,
            );
        }

        match font {
            Some(font) => {
                let label = format!("{} {:.2}", det.class_name, det.confidence);
                let scale = PxScale::from(LABEL_SCALE);
                let (text_w, text_h) = text_size(scale, font, &label);
                let bg_y = (y1 - text_h as i32 - 4).max(0);
                draw_filled_rect_mut(
                    &mut canvas,
                    Rect::at(x1, bg_y).of_size(text_w + 6, text_h + 4),
                    color,
                );
                draw_text_mut(
                    &mut canvas,
                    Rgb([255, 255, 255]),
                    x1 + 3,
                    bg_y + 2,
                    scale,
                    font,
                    &label,
                );
            }
            None => {
                // No font: a small color tab marks the labeled corner
                let tab_y = (y1 - 4).max(0);
                draw_filled_rect_mut(
                    &mut canvas,
                    Rect::at(x1, tab_y).of_size(w.min(24), 4),
                    color,
                );
            }
        }
    }

    canvas
}

/// Encode an annotated image as JPEG bytes
pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, VisionError> {
    let mut buf = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    encoder
        .encode_image(image)
        .map_err(|e| VisionError::EncodeFailed(e.to_string()))?;
    Ok(buf)
}
