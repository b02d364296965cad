use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use callsync::{
    ApiClient, ApiConfig, JsonStateStore, LocalWriter, SyncConfig, SyncEngine, UserDirectory,
};

#[derive(Parser)]
#[command(name = "callsync")]
#[command(author, version, about = "Sync call transcripts into a version-controlled file tree", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Incrementally sync call transcripts to a local directory
    Sync {
        /// Start date (YYYY-MM-DD); defaults to the last synced point
        #[arg(long, value_parser = parse_date)]
        from_date: Option<NaiveDate>,

        /// End date (YYYY-MM-DD); defaults to now
        #[arg(long, value_parser = parse_date)]
        to_date: Option<NaiveDate>,

        /// Output directory for markdown files
        #[arg(short, long, default_value = "./output")]
        output_dir: PathBuf,

        /// State file for incremental sync
        #[arg(long, default_value = "./.callsync-state.json")]
        state_file: PathBuf,

        /// Ignore the synced-call skip list and re-emit everything
        #[arg(long)]
        full_resync: bool,

        /// Overwrite transcript files that already exist
        #[arg(long)]
        update_existing: bool,

        /// Call ids per batch request
        #[arg(long, default_value = "50")]
        batch_size: usize,

        /// Concurrent in-flight batches
        #[arg(long, default_value = "2")]
        concurrency: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List externally-facing calls in a window without syncing
    ListCalls {
        /// Start date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from_date: Option<NaiveDate>,

        /// End date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        to_date: Option<NaiveDate>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List all users known to the platform
    ListUsers {
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sync {
            from_date,
            to_date,
            output_dir,
            state_file,
            full_resync,
            update_existing,
            batch_size,
            concurrency,
            verbose,
        } => {
            setup_logging(verbose);
            let config = SyncConfig {
                from: from_date.map(start_of_day),
                to: to_date.map(start_of_day),
                full_resync,
                batch_size,
                max_concurrent_batches: concurrency,
            };
            run_sync(config, output_dir, state_file, update_existing).await
        }
        Commands::ListCalls {
            from_date,
            to_date,
            verbose,
        } => {
            setup_logging(verbose);
            list_calls(from_date, to_date).await
        }
        Commands::ListUsers { verbose } => {
            setup_logging(verbose);
            list_users().await
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn build_client() -> Result<ApiClient> {
    let config = ApiConfig::from_env()?;
    ApiClient::new(config).context("Failed to construct API client")
}

async fn run_sync(
    config: SyncConfig,
    output_dir: PathBuf,
    state_file: PathBuf,
    update_existing: bool,
) -> Result<()> {
    let client = Arc::new(build_client()?);
    let writer = LocalWriter::new(output_dir.clone(), update_existing);
    let store = JsonStateStore::new(state_file);

    let engine = SyncEngine::new(client, writer, store, config);
    let report = engine.run().await?;

    info!(
        "Synced {} new calls ({} already synced, {} failed) -> {:?}",
        report.synced, report.skipped, report.failed_calls, output_dir
    );
    Ok(())
}

async fn list_calls(from_date: Option<NaiveDate>, to_date: Option<NaiveDate>) -> Result<()> {
    let client = build_client()?;

    let mut calls = client
        .list_calls(from_date.map(start_of_day), to_date.map(start_of_day))
        .await
        .context("Failed to list calls")?;
    calls.sort_by_key(|c| c.started);

    println!("Found {} external calls\n", calls.len());
    for call in &calls {
        let date = call
            .started
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let title = call.title.as_deref().unwrap_or("Untitled");
        println!("  - {date}: {title}");
    }
    Ok(())
}

async fn list_users() -> Result<()> {
    let client = build_client()?;

    let mut users = client.get_users().await.context("Failed to fetch users")?;
    let directory = UserDirectory::new(users.clone());
    println!("Found {} users\n", directory.len());

    users.sort_by_key(|u| u.full_name());
    for user in &users {
        let status = if user.active { "active" } else { "inactive" };
        println!(
            "  - {} ({}) [{status}]",
            user.full_name(),
            user.email_address
        );
    }
    Ok(())
}
