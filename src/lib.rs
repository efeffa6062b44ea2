// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod admission;
pub mod api;
pub mod backend;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod vectorizer;
pub mod version;
pub mod vision;

pub use admission::{AdmissionController, AdmissionPermit};
pub use backend::{BackendKind, EmbeddingBackend};
pub use config::VectorizerConfig;
pub use embeddings::{Embedding, ModelManager, OutputContract, OutputLayout};
pub use errors::VectorizeError;
pub use vectorizer::Vectorizer;
pub use vision::{ImageSource, NormalizedImage};
