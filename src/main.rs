// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use fabstir_vision_node::{
    api::{start_server, AppState},
    config::NodeConfig,
    storage::FileStore,
    version,
    vision::{self, YoloDetector},
};
use std::{env, sync::Arc};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting Fabstir Vision Node...\n");
    println!("📦 BUILD VERSION: {}", version::VERSION);
    println!("📅 Build Date: {}", version::BUILD_DATE);
    println!();

    let config = NodeConfig::from_env();
    let addr = config.socket_addr().context("Invalid bind address")?;

    let store = FileStore::new(config.upload_dir.clone(), config.output_dir.clone())
        .context("Failed to create upload/output directories")?;
    info!(
        "📁 Uploads: {} | Outputs: {}",
        store.upload_dir().display(),
        store.output_dir().display()
    );

    let label_font = vision::load_label_font(config.label_font_path.as_deref());
    if config.label_font_path.is_some() && label_font.is_none() {
        warn!("   Annotated images will be drawn without label text");
    }

    let state = AppState::new(store).with_label_font(label_font);

    println!("🧠 Initializing detection model...");
    match YoloDetector::load(
        &config.model_path,
        config.conf_threshold,
        config.iou_threshold,
    ) {
        Ok(detector) => {
            *state.detector.write().await = Some(Arc::new(detector));
            println!(
                "✅ {} ready (conf {}, iou {})",
                vision::MODEL_NAME,
                config.conf_threshold,
                config.iou_threshold
            );
        }
        Err(e) => {
            warn!("⚠️  Could not load detection model: {:#}", e);
            warn!(
                "   /detect will return 503 until a model is available at {}",
                config.model_path.display()
            );
        }
    }

    start_server(addr, state)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
