//! PEAT CLI
//!
//! Command-line interface for the PEAT privacy exposure scanner.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use peat_api::{ApiConfig, ApiServer};
use peat_core::narrative::{NarrativeContext, RiskLevel};
use peat_core::traits::DurableStore;
use peat_core::types::{Identity, ScanResult, Severity};
use peat_store::FileStore;

/// PEAT - Privacy Exposure Awareness Tool
#[derive(Parser)]
#[command(name = "peat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan an email address or usernames for public exposure
    Scan {
        /// Email address to scan
        #[arg(short, long, conflicts_with = "username")]
        email: Option<String>,
        /// Username to scan (repeat or comma-separate, up to 5)
        #[arg(short, long, value_delimiter = ',')]
        username: Vec<String>,
        /// Ignore cached results
        #[arg(short, long)]
        force_refresh: bool,
        /// Breach and registration lookups only, without caching (email only)
        #[arg(short, long, conflicts_with_all = ["username", "force_refresh"])]
        quick: bool,
        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
        /// Durable store file
        #[arg(long, env = "PEAT_STORE_PATH")]
        store: Option<PathBuf>,
    },

    /// Run the API server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value = "3001")]
        port: u16,
        /// Bind address
        #[arg(short, long, env = "PEAT_HOST", default_value = "0.0.0.0")]
        bind: String,
    },

    /// Inspect or purge a durable store file
    Store {
        /// Durable store file
        #[arg(short, long, env = "PEAT_STORE_PATH")]
        path: PathBuf,
        /// Remove every stored record
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "peat=debug,info"
    } else {
        "peat=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Scan {
            email,
            username,
            force_refresh,
            quick,
            json,
            store,
        } => {
            let mode = if quick {
                ScanMode::Quick
            } else {
                ScanMode::Full { force_refresh }
            };
            cmd_scan(email.as_deref(), &username, mode, json, store).await
        }
        Commands::Serve { port, bind } => cmd_serve(port, &bind).await,
        Commands::Store { path, clear } => cmd_store(&path, clear).await,
    }
}

enum ScanMode {
    Full { force_refresh: bool },
    Quick,
}

/// Scan one identity
async fn cmd_scan(
    email: Option<&str>,
    usernames: &[String],
    mode: ScanMode,
    json: bool,
    store: Option<PathBuf>,
) -> Result<()> {
    let identity = Identity::parse(email, usernames).context("Invalid scan target")?;

    let mut config = ApiConfig::from_env();
    if store.is_some() {
        config.store_path = store;
    }
    let scanner = config
        .build_scanner()
        .await
        .context("Failed to set up scanner")?;

    let spinner = if json {
        ProgressBar::hidden()
    } else {
        println!("{} {}", "🔎 Scanning:".cyan().bold(), identity);
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("   {spinner:.green} {msg} ({elapsed})")?);
        pb.set_message(match mode {
            ScanMode::Full { .. } => "querying breach, registration and profile sources",
            ScanMode::Quick => "querying breach and registration sources",
        });
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };

    let result = match mode {
        ScanMode::Full { force_refresh } => scanner.resolve(identity, force_refresh).await,
        ScanMode::Quick => scanner.quick_scan(identity).await,
    };
    spinner.finish_and_clear();
    let result = result.context("Scan failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Critical => severity.as_str().red().bold(),
        Severity::High => severity.as_str().yellow(),
        Severity::Medium => severity.as_str().normal(),
    }
}

fn risk_label(level: RiskLevel) -> ColoredString {
    let text = level.to_string();
    match level {
        RiskLevel::Critical => text.red().bold(),
        RiskLevel::High => text.red(),
        RiskLevel::Medium => text.yellow(),
        RiskLevel::Low => text.green(),
    }
}

fn print_result(result: &ScanResult) {
    let meta = &result.meta;
    if meta.cached {
        let tier = meta
            .cache_source
            .map(|s| format!("{:?}", s).to_lowercase())
            .unwrap_or_default();
        println!("   {} {} cache", "Served from".dimmed(), tier);
    }
    if meta.breach_count_truncated {
        println!(
            "   {} {} of {} breaches shown.",
            "⚠️ ".yellow(),
            result.breaches.len(),
            meta.total_breaches.unwrap_or_default()
        );
    } else if meta.partial {
        println!("   {}", "⚠️  Some sources failed; results are partial.".yellow());
    }

    let metrics = NarrativeContext::new(
        "",
        result.kind,
        result.breaches.clone(),
        result.registrations.clone(),
        result.username_hits.clone(),
    )
    .with_rate_limited(result.rate_limited.clone())
    .risk_metrics();
    println!("\n{} {} ({}/10)", "Risk:".bold(), risk_label(metrics.level), metrics.score);

    if result.email.is_some() {
        println!("\n{} {}", "Breaches:".yellow().bold(), result.breaches.len());
        for breach in &result.breaches {
            let date = breach
                .breach_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unknown date".into());
            println!(
                "   [{}] {} ({}, {})",
                severity_label(breach.severity),
                breach.title,
                breach.domain,
                date
            );
        }

        println!("\n{} {}", "Registered on:".yellow().bold(), result.registrations.len());
        for service in &result.registrations {
            println!("   {}", service);
        }
        for service in &result.rate_limited {
            println!("   {} {}", service, "(rate limited, unconfirmed)".dimmed());
        }
    }

    println!("\n{} {}", "Public profiles:".yellow().bold(), result.username_hits.len());
    for hit in &result.username_hits {
        println!("   {} {}", hit.platform.green(), hit.url.dimmed());
    }

    println!("\n{}", result.narrative);
    println!(
        "{} {} ms",
        "Completed in".dimmed(),
        meta.timing.total_ms
    );
}

/// Run API server
async fn cmd_serve(port: u16, bind: &str) -> Result<()> {
    println!("{}", "🚀 Starting PEAT API server...".cyan().bold());
    println!("   {} http://{}:{}", "Listening on:".green(), bind, port);
    println!("   {} http://{}:{}/health", "Health check:".dimmed(), bind, port);
    println!("\n   Press Ctrl+C to stop.\n");

    let config = ApiConfig::from_env();
    let server = ApiServer::from_config(config)
        .await
        .context("Failed to set up server")?;

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    server.run(addr).await?;

    Ok(())
}

/// Inspect or clear a durable store
async fn cmd_store(path: &Path, clear: bool) -> Result<()> {
    let store = FileStore::open(path)
        .await
        .with_context(|| format!("Failed to open store {}", path.display()))?;

    if clear {
        let removed = store.clear().await.context("Failed to clear store")?;
        info!(removed, path = %path.display(), "durable store cleared");
        println!("{} {} record(s) removed", "✅".green(), removed);
        return Ok(());
    }

    let records = store.all_records();
    println!("{} {} ({} records)", "📦 Store:".cyan().bold(), path.display(), records.len());
    for record in records {
        println!(
            "   {} {} breaches, {} total hits, checked {}",
            record.email.bold(),
            record.result.breaches.len(),
            record.risk_summary.total_hits,
            record.last_checked.format("%Y-%m-%d %H:%M UTC")
        );
    }

    Ok(())
}
