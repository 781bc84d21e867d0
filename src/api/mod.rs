// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod detect;
pub mod errors;
pub mod http_server;
pub mod outputs;

pub use detect::{detect_handler, DetectResponse};
pub use errors::{ApiError, ErrorDetail};
pub use http_server::{create_app, start_server, AppState};
pub use outputs::get_output_handler;
