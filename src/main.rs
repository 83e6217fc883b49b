//! nftprobe - nftables rule validation and translation CLI
//!
//! Thin pass-through over the library: every subcommand maps onto one core
//! operation and prints the interchange JSON (or the encoded rule string)
//! on stdout.
//!
//! # Usage
//!
//! ```bash
//! nftprobe check 'tcp dport 8428 ip saddr 10.28.1.97 accept'
//! nftprobe decode 'ip saddr @trusted tcp dport 8428 accept'
//! nftprobe encode "{'ipv6': False, 'daddr': '1.2.3.0/24', 'protocol': 'tcp', 'action': 'accept'}"
//! nftprobe parse "[{'accept': None}]"
//! nftprobe sets 'ip6 saddr @v6hosts accept'
//! ```
//!
//! Exit codes: 0 = valid/success, 1 = rule rejected by the engine,
//! 2 = operational error.

use clap::{Parser, Subcommand};
use nftprobe::core::error::NftablesErrorPattern;
use nftprobe::core::{decode, encode, probe, tokens};
use nftprobe::{NftSession, RuleCheck, RuleSummary};
use std::process::ExitCode;

shadow_rs::shadow!(build);

#[derive(Parser)]
#[command(name = "nftprobe")]
#[command(about = "Validate and translate nftables rules against the live engine", long_about = None)]
#[command(version, long_version = build::CLAP_LONG_VERSION)]
struct Cli {
    /// Override the scratch table name from the config file
    #[arg(short, long, value_name = "NAME")]
    table: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a rule against the engine without installing it
    Check {
        /// The rule string, e.g. 'tcp dport 8428 ip saddr 10.28.1.97 accept'
        rule: String,
        /// Skip reconciliation of @set references before the probe
        #[arg(long)]
        no_sets: bool,
    },
    /// Validate a rule and print its flat dictionary representation
    Decode {
        /// The rule string; referenced @sets are created as needed
        rule: String,
    },
    /// Render a dictionary literal back into a rule string
    Encode {
        /// Dictionary literal, JSON or single-quoted
        literal: String,
    },
    /// Decode an expression literal without touching the engine
    Parse {
        /// Expression term list, JSON or single-quoted
        literal: String,
    },
    /// Show set references and address family extracted from a rule
    Sets {
        /// The rule string to scan
        rule: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let _ = nftprobe::utils::ensure_dirs();
    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    match runtime.block_on(handle_cli(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}

async fn handle_cli(cli: Cli) -> nftprobe::Result<ExitCode> {
    match cli.command {
        Commands::Check { rule, no_sets } => {
            let mut session = connect_session(cli.table).await?;
            let check = if no_sets {
                probe::check_rule(&mut session, &rule).await?
            } else {
                probe::check_rule_with_sets(&mut session, &rule).await?
            };

            match check {
                RuleCheck::Valid { expr } => {
                    println!("{}", serde_json::to_string_pretty(&expr)?);
                    Ok(ExitCode::SUCCESS)
                }
                RuleCheck::Invalid { reason } => {
                    print_rejection(&reason);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Decode { rule } => {
            let mut session = connect_session(cli.table).await?;
            match probe::check_rule_with_sets(&mut session, &rule).await? {
                RuleCheck::Valid { expr } => {
                    let summary = decode::decode_expr(&expr)?;
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                    Ok(ExitCode::SUCCESS)
                }
                RuleCheck::Invalid { reason } => {
                    print_rejection(&reason);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Encode { literal } => {
            let summary = RuleSummary::from_literal(&literal)?;
            warn_suspect_addresses(&summary);
            println!("{}", encode::encode_summary(&summary));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Parse { literal } => {
            let summary = decode::decode_expr_literal(&literal)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Sets { rule } => {
            let refs = tokens::extract_set_refs(&rule);
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "sets": refs.names,
                    "ipv6": refs.ipv6,
                }))?
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn connect_session(table_override: Option<String>) -> nftprobe::Result<NftSession> {
    let mut config = nftprobe::config::load_config().await;
    if let Some(table) = table_override {
        config.table_name = table;
    }
    NftSession::connect(&config).await
}

/// Prints an engine rejection with translated suggestions
fn print_rejection(reason: &str) {
    let translation = NftablesErrorPattern::match_error(reason);
    eprintln!("Rule rejected: {}", translation.user_message);
    for suggestion in &translation.suggestions {
        eprintln!("  - {suggestion}");
    }
    if let Some(url) = &translation.help_url {
        eprintln!("  See: {url}");
    }
}

/// Warns about address fields the engine is likely to reject
fn warn_suspect_addresses(summary: &RuleSummary) {
    for (field, value) in [("saddr", &summary.saddr), ("daddr", &summary.daddr)] {
        if let Some(value) = value
            && !nftprobe::validators::check_address_field(value)
        {
            tracing::warn!("{field} {value:?} does not look like an address, network or @set");
        }
    }
}
