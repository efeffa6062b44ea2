// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod diagnostics;
pub mod errors;
pub mod http_server;
pub mod vectorize;

pub use diagnostics::{health_handler, root_handler, test_hf_handler, HealthResponse, TestHfResponse};
pub use errors::{ApiError, ErrorResponse};
pub use http_server::{build_router, start_server, AppState};
pub use vectorize::{vectorize_handler, VectorizeRequest, VectorizeResponse};

/// Short id tying log lines and error bodies of one request together
pub fn new_request_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}
