// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod storage;
pub mod version;
pub mod vision;

// Re-export main types
pub use api::{ApiError, DetectResponse, ErrorDetail};
pub use config::NodeConfig;
pub use storage::{FileStore, StorageError};
pub use vision::{Detection, DetectionDocument, VisionError, YoloDetector};
