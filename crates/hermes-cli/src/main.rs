use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use hermes_client::ReqwestPeopleApi;
use hermes_core::batch::{BatchOutcome, BatchRunner};
use hermes_core::pacer::Pacer;
use hermes_core::retry::RetryPolicy;

/// Exit code when at least one identifier finished Failed.
const EXIT_PARTIAL: i32 = 1;
/// Exit code when the run aborted before processing all input.
const EXIT_FATAL: i32 = 2;

#[derive(Parser)]
#[command(name = "hermes", version, about = "Contact enrichment from LinkedIn profile URLs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich a file of profile URLs and write results as CSV
    Enrich {
        /// Input file: one LinkedIn profile URL per line
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV file
        #[arg(short, long, default_value = "contacts.csv")]
        output: PathBuf,

        /// API key (reads from HERMES_API_KEY env var if not provided)
        #[arg(short, long, env = "HERMES_API_KEY")]
        api_key: String,

        /// People-data API base URL
        #[arg(
            short,
            long,
            env = "HERMES_BASE_URL",
            default_value = "https://api.apollo.io/v1"
        )]
        base_url: String,

        /// Minimum milliseconds between outbound API calls
        #[arg(long, default_value_t = 500)]
        min_spacing_ms: u64,

        /// Attempt ceiling per API operation (first try included)
        #[arg(long, default_value_t = 3)]
        max_attempts: u32,

        /// HTTP timeout per API call, in seconds
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("hermes=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Enrich {
            input,
            output,
            api_key,
            base_url,
            min_spacing_ms,
            max_attempts,
            timeout_secs,
        } => {
            cmd_enrich(
                &input,
                &output,
                &api_key,
                &base_url,
                min_spacing_ms,
                max_attempts,
                timeout_secs,
            )
            .await
        }
    }
}

async fn cmd_enrich(
    input: &Path,
    output: &Path,
    api_key: &str,
    base_url: &str,
    min_spacing_ms: u64,
    max_attempts: u32,
    timeout_secs: u64,
) -> Result<()> {
    let identifiers = read_identifiers(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;

    if identifiers.is_empty() {
        anyhow::bail!("Input file {} contains no identifiers", input.display());
    }

    tracing::info!(count = %identifiers.len(), "Read identifiers");

    let api = ReqwestPeopleApi::with_base_url(api_key, base_url)
        .and_then(|api| api.with_timeout(Duration::from_secs(timeout_secs)))
        .map_err(|e| anyhow::anyhow!(e))?;

    let runner = BatchRunner::new(api)
        .with_pacer(Pacer::new(Duration::from_millis(min_spacing_ms)))
        .with_retry_policy(RetryPolicy { max_attempts });

    // Ctrl-C stops issuing new calls; in-flight work still gets recorded.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight work");
            signal_cancel.cancel();
        }
    });

    let outcome = runner.run(&identifiers, &cancel).await;

    // Best-effort flush: the output covers every input identifier even
    // when the run aborted early.
    write_csv(output, &outcome)
        .with_context(|| format!("Failed to write output file: {}", output.display()))?;

    println!("Profiles processed: {}", outcome.records.len());
    println!("Failed: {}", outcome.failed_count());
    println!("Mobile credits spent: {}", outcome.credits_spent());
    println!("Results written to {}", output.display());

    match exit_code(&outcome) {
        0 => Ok(()),
        code => std::process::exit(code),
    }
}

/// Read one identifier per line, trimmed; blank lines are skipped and
/// duplicates are preserved.
fn read_identifiers(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let mut identifiers = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            identifiers.push(trimmed.to_string());
        }
    }
    Ok(identifiers)
}

/// Column order is stable across runs; downstream tooling depends on it.
const CSV_HEADER: [&str; 12] = [
    "identifier",
    "match_status",
    "name",
    "title",
    "company",
    "company_website",
    "company_industry",
    "email",
    "mobile_availability",
    "mobile_phone",
    "mobile_lookup_attempted",
    "errors",
];

fn write_csv(path: &Path, outcome: &BatchOutcome) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(CSV_HEADER)?;

    for finalized in &outcome.records {
        let record = &finalized.record;
        let errors = record.errors_joined();
        writer.write_record([
            record.identifier.as_str(),
            record.match_status.as_str(),
            record.name.as_deref().unwrap_or(""),
            record.title.as_deref().unwrap_or(""),
            record.company.as_deref().unwrap_or(""),
            record.company_website.as_deref().unwrap_or(""),
            record.company_industry.as_deref().unwrap_or(""),
            record.email.as_deref().unwrap_or(""),
            record.mobile_availability.as_str(),
            record.mobile_phone.as_deref().unwrap_or(""),
            if record.mobile_lookup_attempted {
                "true"
            } else {
                "false"
            },
            errors.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn exit_code(outcome: &BatchOutcome) -> i32 {
    if outcome.fatal.is_some() {
        EXIT_FATAL
    } else if outcome.failed_count() > 0 {
        EXIT_PARTIAL
    } else {
        0
    }
}
