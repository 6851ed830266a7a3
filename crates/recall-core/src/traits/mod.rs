// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the pluggable collaborators of the search core.
//!
//! Network-backed adapters extend the [`PluginAdapter`] base trait. All traits
//! use `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod classifier;
pub mod embedding;
pub mod judge;
pub mod reranker;

pub use adapter::PluginAdapter;
pub use classifier::StatementClassifier;
pub use embedding::EmbeddingAdapter;
pub use judge::RelevanceJudge;
pub use reranker::RerankAdapter;
