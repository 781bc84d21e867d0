// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration parsed from environment variables
//!
//! All settings have working defaults so the node starts with no
//! configuration at all. A `.env` file is honored when present
//! (loaded by `main` before `from_env` runs).

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default API port (matches the client's default base URL)
const DEFAULT_API_PORT: u16 = 8000;

/// Default bind address
const DEFAULT_BIND_ADDR: &str = "127.0.0.1";

/// Default ONNX model path
const DEFAULT_MODEL_PATH: &str = "./models/yolov8n.onnx";

/// Default confidence threshold for kept detections
pub const DEFAULT_CONF_THRESHOLD: f32 = 0.25;

/// Default IoU threshold for non-maximum suppression
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// Runtime configuration for the vision node
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address the API server binds to
    pub bind_addr: String,
    /// Port the API server listens on
    pub api_port: u16,
    /// Path to the YOLOv8n ONNX model file
    pub model_path: PathBuf,
    /// Directory uploads are persisted to
    pub upload_dir: PathBuf,
    /// Directory output artifacts are written to
    pub output_dir: PathBuf,
    /// Confidence threshold in [0, 1]
    pub conf_threshold: f32,
    /// NMS IoU threshold in [0, 1]
    pub iou_threshold: f32,
    /// Optional TTF/OTF font for burned-in labels.
    /// When unset or unloadable, boxes are drawn without label text.
    pub label_font_path: Option<PathBuf>,
}

impl NodeConfig {
    /// Build a configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let bind_addr =
            env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_API_PORT);
        let model_path = PathBuf::from(
            env::var("MODEL_PATH").unwrap_or_else(|_| DEFAULT_MODEL_PATH.to_string()),
        );
        let upload_dir =
            PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()));
        let output_dir =
            PathBuf::from(env::var("OUTPUT_DIR").unwrap_or_else(|_| "./outputs".to_string()));
        let conf_threshold = env::var("CONF_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(DEFAULT_CONF_THRESHOLD);
        let iou_threshold = env::var("IOU_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .unwrap_or(DEFAULT_IOU_THRESHOLD);
        let label_font_path = env::var("LABEL_FONT_PATH").ok().map(PathBuf::from);

        Self {
            bind_addr,
            api_port,
            model_path,
            upload_dir,
            output_dir,
            conf_threshold,
            iou_threshold,
            label_font_path,
        }
    }

    /// Socket address the server binds to
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.bind_addr, self.api_port).parse()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            api_port: DEFAULT_API_PORT,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            upload_dir: PathBuf::from("./uploads"),
            output_dir: PathBuf::from("./outputs"),
            conf_threshold: DEFAULT_CONF_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            label_font_path: None,
        }
    }
}
