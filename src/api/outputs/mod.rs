// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! GET /outputs/{file_name} endpoint

pub mod handler;

pub use handler::get_output_handler;
