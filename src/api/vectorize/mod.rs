// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Vectorize API Module
//!
//! POST /vectorize: one image in (URL or base64), one embedding out.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::vectorize_handler;
pub use request::VectorizeRequest;
pub use response::VectorizeResponse;
