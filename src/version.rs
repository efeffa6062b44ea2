// Version information for the CLIP vectorizer

/// Full version string with feature description
pub const VERSION: &str = "v1.0.0-clip-vectorizer-2026-10-19";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2026-10-19";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "local-onnx-backend",
    "browser-backend",
    "hosted-backend",
    "single-flight-admission",
    "center-crop-70",
    "inference-timeout",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("CLIP Vectorizer {} ({})", VERSION_NUMBER, BUILD_DATE)
}
