//! GroupGuard CLI
//!
//! Runs group membership validations against a static JSON directory through
//! the cache-aside validator.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tokio::task::JoinSet;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use groupguard_core::types::AccessToken;
use groupguard_validator::{MembershipValidator, StaticDirectory, ValidatorConfig};

/// GroupGuard - cached group membership validation
#[derive(Parser)]
#[command(name = "groupguard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Group directory file: a JSON object of email -> [groups]
    #[arg(short, long, global = true, env = "GROUPS_DIRECTORY")]
    directory: Option<PathBuf>,

    /// Cache TTL in seconds (overrides GROUPS_CACHE_TTL)
    #[arg(long, global = true)]
    cache_ttl_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a user's membership in a set of allowed groups
    Check {
        /// User email
        #[arg(short, long)]
        email: String,
        /// Comma-separated allowed groups
        #[arg(short, long)]
        groups: String,
        /// Access token forwarded to the provider
        #[arg(long, env = "GROUPS_ACCESS_TOKEN", default_value = "")]
        token: String,
        /// Number of times to validate (later runs hit the cache)
        #[arg(short, long, default_value = "1")]
        repeat: usize,
    },

    /// Fire concurrent validations and report cache behavior
    Bench {
        /// Comma-separated allowed groups
        #[arg(short, long)]
        groups: String,
        /// Concurrent validations per user
        #[arg(short, long, default_value = "100")]
        concurrency: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "groupguard=debug,info"
    } else {
        "groupguard=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ValidatorConfig::from_env().context("Failed to load configuration")?;
    if let Some(secs) = cli.cache_ttl_secs {
        config = config.with_ttl(Duration::from_secs(secs));
    }

    let directory = Arc::new(match &cli.directory {
        Some(path) => load_directory(path)?,
        None => StaticDirectory::new(),
    });

    match cli.command {
        Commands::Check {
            email,
            groups,
            token,
            repeat,
        } => cmd_check(directory, &config, &email, &parse_groups(&groups), token.into(), repeat).await,
        Commands::Bench { groups, concurrency } => {
            cmd_bench(directory, &config, &parse_groups(&groups), concurrency).await
        }
    }
}

/// Reads a JSON group directory from disk.
fn load_directory(path: &Path) -> Result<StaticDirectory> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read group directory {}", path.display()))?;
    let directory = StaticDirectory::from_json(&json).context("Failed to parse group directory")?;
    info!(users = directory.len(), path = %path.display(), "Loaded group directory");
    Ok(directory)
}

/// Splits a comma-separated group list, dropping blanks.
fn parse_groups(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|group| !group.is_empty())
        .map(String::from)
        .collect()
}

/// Validate one user, possibly several times
async fn cmd_check(
    directory: Arc<StaticDirectory>,
    config: &ValidatorConfig,
    email: &str,
    allowed_groups: &[String],
    token: AccessToken,
    repeat: usize,
) -> Result<()> {
    println!("{} {}", "🔍 Checking:".cyan().bold(), email);
    println!("   {} {}", "Allowed groups:".dimmed(), allowed_groups.join(", "));

    let validator = MembershipValidator::with_config(directory.clone(), config);

    for run in 1..=repeat.max(1) {
        let start = Instant::now();
        let valid = validator
            .validate(email, allowed_groups, &token)
            .await
            .context("Group membership validation failed")?;

        if valid.is_empty() {
            println!("   {} run {}: not a member ({:?})", "❌".red(), run, start.elapsed());
        } else {
            println!(
                "   {} run {}: {} ({:?})",
                "✅".green(),
                run,
                valid.join(", "),
                start.elapsed()
            );
        }
    }

    print_stats(&validator, &directory)
}

/// Concurrent validations for every user in the directory
async fn cmd_bench(
    directory: Arc<StaticDirectory>,
    config: &ValidatorConfig,
    allowed_groups: &[String],
    concurrency: usize,
) -> Result<()> {
    let emails: Vec<String> = directory.emails();
    if emails.is_empty() {
        println!("{}", "⚠️  Directory is empty. Use --directory to load one.".yellow());
        return Ok(());
    }

    println!(
        "{} {} users x {} concurrent validations",
        "📊 Benchmarking".cyan().bold(),
        emails.len(),
        concurrency
    );

    let validator = Arc::new(MembershipValidator::with_config(directory.clone(), config));
    let allowed_groups = Arc::new(allowed_groups.to_vec());
    let mut tasks = JoinSet::new();

    let start = Instant::now();
    for email in &emails {
        for _ in 0..concurrency {
            let validator = validator.clone();
            let allowed_groups = allowed_groups.clone();
            let email = email.clone();
            tasks.spawn(async move {
                validator
                    .validate(&email, &allowed_groups, &AccessToken::default())
                    .await
            });
        }
    }

    let mut members = 0usize;
    while let Some(result) = tasks.join_next().await {
        if !result??.is_empty() {
            members += 1;
        }
    }
    let elapsed = start.elapsed();

    println!("   ✓ {} validations in {:?}", emails.len() * concurrency, elapsed);
    println!("   ✓ {} granted", members);

    print_stats(&validator, &directory)
}

fn print_stats(validator: &MembershipValidator, directory: &StaticDirectory) -> Result<()> {
    let stats = validator.stats();
    println!("\n{}", "📈 Cache:".green().bold());
    println!(
        "   Hits: {}  Misses: {}  Coalesced: {}  Follow-ups: {}",
        stats.hits, stats.misses, stats.coalesced, stats.follow_ups
    );
    println!("   Hit ratio: {:.1}%", stats.hit_ratio() * 100.0);
    println!("   Upstream lookups: {}", directory.lookups());
    println!("   Upstream errors: {}", stats.upstream_errors);
    println!("   Cache write failures: {}", stats.cache_write_failures);

    println!("\n{}", "📋 Cache (JSON):".yellow().bold());
    println!("{}", serde_json::to_string_pretty(&validator.cache().stats())?);

    Ok(())
}
