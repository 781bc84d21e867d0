// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! One-shot detection client
//!
//! Drives the vision node end to end: uploads an image to /detect,
//! fetches the annotated output, prints a detection summary with
//! per-class counts and confidence bars, and saves three download
//! bundles (annotated image, detection JSON, zip of both).
//!
//! The progress bar shown while waiting is cosmetic only; it advances
//! on a timer, not on actual server progress. "Inference time" and
//! "FPS" are round-trip wall-clock figures including network and file
//! I/O, not model throughput.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use fabstir_vision_node::api::{DetectResponse, ErrorDetail};
use fabstir_vision_node::vision::{self, INPUT_SIZE, MODEL_NAME};

/// Approximate parameter count shown in the metadata panel
const MODEL_PARAMS: &str = "3.2M (approx)";

/// Zip bundle filename
const BUNDLE_NAME: &str = "yolo_detection_bundle.zip";

#[derive(Parser, Debug)]
#[command(name = "detect-client", about = "Upload an image and get instant object detection")]
struct Args {
    /// Image file to run detection on
    image: PathBuf,

    /// Detection service base URL
    #[arg(long, env = "DETECT_API_URL", default_value = "http://127.0.0.1:8000")]
    api_url: String,

    /// Directory the download bundles are written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Print the raw detection JSON
    #[arg(long)]
    show_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("Failed to read {}", args.image.display()))?;
    let file_name = args
        .image
        .file_name()
        .and_then(|n| n.to_str())
        .context("Image path has no file name")?
        .to_string();

    // Decode locally for the metadata panel; also catches non-images
    // before they hit the wire.
    let (_, info) = vision::decode_image_bytes(&bytes)
        .map_err(|e| anyhow::anyhow!("{} is not a usable image: {}", args.image.display(), e))?;
    let mime = format!("image/{}", mime_subtype(info.format));

    println!("📁 Uploading {} ({}x{}, {} bytes)", file_name, info.width, info.height, info.size_bytes);

    let client = reqwest::Client::new();
    let progress = cosmetic_progress_bar();
    let started = Instant::now();

    // Cosmetic ramp, decoupled from actual server progress
    for step in (0..70).step_by(10) {
        tokio::time::sleep(Duration::from_millis(70)).await;
        progress.set_position(step);
    }

    let part = reqwest::multipart::Part::bytes(bytes.clone())
        .file_name(file_name.clone())
        .mime_str(&mime)?;
    let form = reqwest::multipart::Form::new().part("file", part);

    let response = client
        .post(format!("{}/detect", args.api_url))
        .multipart(form)
        .send()
        .await
        .context("Detection request failed")?;

    progress.set_position(100);
    progress.finish_and_clear();

    let elapsed_ms = round2(started.elapsed().as_secs_f64() * 1000.0);
    let fps = if elapsed_ms > 0.0 { round2(1000.0 / elapsed_ms) } else { 0.0 };

    let status = response.status();
    if !status.is_success() {
        let detail = response
            .json::<ErrorDetail>()
            .await
            .map(|e| e.detail)
            .unwrap_or_else(|_| "no detail in response".to_string());
        bail!("Service returned {}: {}", status, detail);
    }

    let result: DetectResponse = response
        .json()
        .await
        .context("Failed to parse detection response")?;

    let annotated_bytes = client
        .get(format!("{}/outputs/{}", args.api_url, result.annotated_image))
        .send()
        .await
        .context("Failed to fetch annotated image")?
        .error_for_status()
        .context("Annotated image fetch rejected")?
        .bytes()
        .await?;

    println!("✅ Detection Completed!\n");
    print_summary(&result);

    if args.show_json {
        println!("Detection JSON:");
        println!("{}", serde_json::to_string_pretty(&result.detections)?);
        println!();
    }

    println!("Performance (round-trip, not model throughput):");
    println!("  Inference Time: {} ms", elapsed_ms);
    println!("  FPS:            {}", fps);
    println!();
    println!("Image & Model Metadata:");
    println!("  Image Size:       {} x {}", info.width, info.height);
    println!("  Model:            {}", MODEL_NAME);
    println!("  Model Parameters: {}", MODEL_PARAMS);
    println!("  Model Input Size: {} x {}", INPUT_SIZE, INPUT_SIZE);
    println!();

    save_bundles(&args.out_dir, &result, &annotated_bytes)?;

    Ok(())
}

fn cosmetic_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("Running YOLO inference... [{bar:30}] {pos}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar
}

fn print_summary(result: &DetectResponse) {
    println!("Object Summary:");
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for det in &result.detections {
        *counts.entry(det.class_name.as_str()).or_default() += 1;
    }
    if counts.is_empty() {
        println!("  (no objects detected)");
    }
    for (class, count) in &counts {
        println!("  {}: {}", class, count);
    }
    println!();

    println!("Confidence Scores:");
    for det in &result.detections {
        let filled = (det.confidence * 20.0).round() as usize;
        println!(
            "  {:<14} {}{} {:.1}%",
            det.class_name,
            "█".repeat(filled.min(20)),
            "░".repeat(20usize.saturating_sub(filled)),
            det.confidence * 100.0
        );
    }
    println!();
}

/// Save the three download bundles: annotated image, detection JSON,
/// and a zip of both.
fn save_bundles(out_dir: &PathBuf, result: &DetectResponse, annotated: &[u8]) -> Result<()> {
    std::fs::create_dir_all(out_dir)?;

    let image_path = out_dir.join(&result.annotated_image);
    std::fs::write(&image_path, annotated)?;

    let json_str = serde_json::to_string_pretty(&result.detections)?;
    let json_path = out_dir.join(&result.json_file);
    std::fs::write(&json_path, &json_str)?;

    let zip_path = out_dir.join(BUNDLE_NAME);
    let file = std::fs::File::create(&zip_path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();
    zip.start_file(result.json_file.as_str(), options)?;
    zip.write_all(json_str.as_bytes())?;
    zip.start_file(result.annotated_image.as_str(), options)?;
    zip.write_all(annotated)?;
    zip.finish()?;

    println!("Downloads:");
    println!("  ⬇ Annotated Image: {}", image_path.display());
    println!("  ⬇ JSON Output:     {}", json_path.display());
    println!("  ⬇ All Outputs:     {}", zip_path.display());

    Ok(())
}

fn mime_subtype(format: image::ImageFormat) -> &'static str {
    match format {
        image::ImageFormat::Jpeg => "jpeg",
        image::ImageFormat::Png => "png",
        image::ImageFormat::WebP => "webp",
        image::ImageFormat::Gif => "gif",
        image::ImageFormat::Bmp => "bmp",
        image::ImageFormat::Tiff => "tiff",
        _ => "unknown",
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
