use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

mod loader;
mod metrics;
mod models;
mod report;

const DEFAULT_SESSIONS: &str = "data/processed/streaming_ab_test_sessions_cleaned.csv";

#[derive(Parser)]
#[command(name = "ab-session-metrics")]
#[command(about = "Per-user engagement metrics for streaming A/B test sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a session export against the expected schema
    Check {
        #[arg(long, default_value = DEFAULT_SESSIONS)]
        sessions: PathBuf,
    },
    /// Compute per-user engagement metrics
    Metrics {
        #[arg(long, default_value = DEFAULT_SESSIONS)]
        sessions: PathBuf,
        #[arg(long)]
        aggregates: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = DEFAULT_SESSIONS)]
        sessions: PathBuf,
        #[arg(long)]
        aggregates: Option<PathBuf>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { sessions } => {
            let records = load_sessions(&sessions)?;
            let users: HashSet<&str> = records.iter().map(|r| r.user_id.as_str()).collect();
            println!(
                "Schema OK: {} sessions across {} users.",
                records.len(),
                users.len()
            );
        }
        Commands::Metrics {
            sessions,
            aggregates,
            limit,
            json,
        } => {
            let records = load_sessions(&sessions)?;
            let flags = metrics::compute_seven_day_return_flags(&records);

            match aggregates {
                Some(path) => {
                    let aggregates = load_aggregates(&path)?;
                    let engagement = report::build_engagement(&aggregates, &flags);

                    if json {
                        println!("{}", serde_json::to_string_pretty(&engagement)?);
                        return Ok(());
                    }

                    println!("Top users by average minutes watched:");
                    for row in engagement.iter().take(limit) {
                        println!(
                            "- {} {:.1} min/session, CTR {:.3}, completion {:.2}, {}",
                            row.user_id,
                            row.avg_minutes_watched,
                            row.ctr,
                            row.completion_rate,
                            if row.returned_within_week == 1 {
                                "returned within 7 days"
                            } else {
                                "did not return"
                            }
                        );
                    }
                }
                None => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&flags)?);
                        return Ok(());
                    }

                    let returned = flags.values().filter(|flag| **flag == 1).count();
                    println!(
                        "{} of {} users returned within 7 days of their first session.",
                        returned,
                        flags.len()
                    );
                }
            }
        }
        Commands::Report {
            sessions,
            aggregates,
            out,
        } => {
            let records = load_sessions(&sessions)?;
            let flags = metrics::compute_seven_day_return_flags(&records);
            let engagement = match aggregates {
                Some(path) => Some(report::build_engagement(&load_aggregates(&path)?, &flags)),
                None => None,
            };

            let rendered = report::build_report(&records, engagement.as_deref(), &flags);
            std::fs::write(&out, rendered)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn load_sessions(path: &Path) -> anyhow::Result<Vec<models::SessionRecord>> {
    loader::load_sessions(path)
        .with_context(|| format!("failed to load sessions from {}", path.display()))
}

fn load_aggregates(path: &Path) -> anyhow::Result<Vec<models::UserAggregate>> {
    loader::load_user_aggregates(path)
        .with_context(|| format!("failed to load user aggregates from {}", path.display()))
}
