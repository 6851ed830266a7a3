// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Recall memory engine.
//!
//! This crate provides the error type, the adapter traits for every external
//! collaborator of the search core (embedding, reranking, relevance judging,
//! statement classification), and the types exchanged with them.

pub mod error;
pub mod traits;
pub mod types;

pub use error::RecallError;
pub use types::{AdapterType, Classification, HealthStatus};

pub use traits::{
    EmbeddingAdapter, PluginAdapter, RelevanceJudge, RerankAdapter, StatementClassifier,
};
