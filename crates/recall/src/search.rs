// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `recall search`: run one query against the configured database.

use chrono::{DateTime, Utc};
use clap::{Args, ValueEnum};
use recall_config::RecallConfig;
use recall_core::RecallError;
use recall_memory::{SearchOptions, SearchResponse, SearchService, SortOrder};
use tracing::info;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum SortArg {
    #[default]
    Relevance,
    Recency,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// The query text.
    pub query: String,

    /// Owner of the memory graph.
    #[arg(long)]
    pub user: String,

    /// Maximum number of results.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Maximum graph traversal depth.
    #[arg(long)]
    pub depth: Option<usize>,

    /// Evaluate facts as of this RFC 3339 time instead of now.
    #[arg(long)]
    pub valid_at: Option<DateTime<Utc>>,

    /// Ignore facts asserted before this RFC 3339 time.
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,

    /// Also report facts that are no longer valid.
    #[arg(long)]
    pub include_invalidated: bool,

    /// Only episodes carrying one of these labels.
    #[arg(long = "label")]
    pub labels: Vec<String>,

    /// Skip adaptive quality filtering.
    #[arg(long)]
    pub no_adaptive: bool,

    #[arg(long, value_enum, default_value_t = SortArg::Relevance)]
    pub sort: SortArg,

    /// Print the structured JSON response.
    #[arg(long)]
    pub json: bool,
}

impl SearchArgs {
    fn options(&self) -> SearchOptions {
        SearchOptions {
            limit: self.limit,
            max_bfs_depth: self.depth,
            start_time: self.since,
            valid_at: self.valid_at,
            include_invalidated: self.include_invalidated,
            labels: self.labels.clone(),
            adaptive_filtering: !self.no_adaptive,
            structured: self.json,
            sort: match self.sort {
                SortArg::Relevance => SortOrder::Relevance,
                SortArg::Recency => SortOrder::Recency,
            },
            ..SearchOptions::default()
        }
    }
}

pub async fn run(config: &RecallConfig, args: SearchArgs) -> Result<(), RecallError> {
    let service = SearchService::from_config(config).await?;
    let report = service
        .search_with_report(&args.query, &args.user, &args.options())
        .await?;
    info!(
        elapsed_ms = report.elapsed.as_millis() as u64,
        entities = report.query_entities.len(),
        failed = report.failed_strategies.len(),
        "search finished"
    );

    match report.response {
        SearchResponse::Text(text) => println!("{text}"),
        structured @ SearchResponse::Structured(_) => {
            let json = serde_json::to_string_pretty(&structured)
                .map_err(|e| RecallError::Internal(format!("failed to encode response: {e}")))?;
            println!("{json}");
        }
    }
    Ok(())
}
