// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Recall integration tests.
//!
//! # Components
//!
//! - [`MockEmbedder`] - deterministic bag-of-words embeddings
//! - [`MockReranker`], [`MockJudge`], [`MockClassifier`] - scripted scoring collaborators
//! - [`GraphFixture`] - in-memory graph builder using the mock embedder

pub mod fixture;
pub mod mock_embedder;
pub mod mock_scoring;

pub use fixture::{GraphFixture, day};
pub use mock_embedder::MockEmbedder;
pub use mock_scoring::{MockClassifier, MockJudge, MockReranker};
