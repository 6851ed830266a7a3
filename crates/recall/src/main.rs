// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recall - temporal knowledge-graph memory for AI agents.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod search;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Recall - temporal knowledge-graph memory for AI agents.
#[derive(Parser, Debug)]
#[command(name = "recall", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Search a user's memory.
    Search(search::SearchArgs),
    /// Validate configuration and print the effective settings.
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match cli.config.as_deref() {
        Some(path) => recall_config::load_and_validate_path(path),
        None => recall_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            recall_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Search(args) => {
            init_tracing(&config.log.level);
            if let Err(e) = search::run(&config, args).await {
                eprintln!("recall search: {e}");
                std::process::exit(1);
            }
        }
        Commands::CheckConfig => match toml::to_string_pretty(&config) {
            Ok(rendered) => {
                eprintln!("recall: configuration is valid");
                println!("{rendered}");
            }
            Err(e) => {
                eprintln!("recall: failed to render configuration: {e}");
                std::process::exit(1);
            }
        },
    }
}

/// Log to stderr; `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("recall={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn default_config_renders_as_toml() {
        let config = recall_config::RecallConfig::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(rendered.contains("[search]"));
        assert!(rendered.contains("token_budget = 10000"));
    }

    #[test]
    fn parses_search_command() {
        let cli = Cli::try_parse_from([
            "recall",
            "search",
            "where does alice work",
            "--user",
            "u1",
            "--limit",
            "5",
            "--json",
            "--include-invalidated",
        ])
        .unwrap();
        let Commands::Search(args) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.query, "where does alice work");
        assert_eq!(args.user, "u1");
        assert_eq!(args.limit, Some(5));
        assert!(args.json);
        assert!(args.include_invalidated);
    }

    #[test]
    fn parses_check_config() {
        let cli = Cli::try_parse_from(["recall", "check-config", "--config", "/tmp/r.toml"])
            .unwrap();
        assert!(matches!(cli.command, Commands::CheckConfig));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/r.toml")));
    }
}
