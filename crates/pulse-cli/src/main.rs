mod output;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pulse_client::{BulkReportClient, RequestExecutor};
use pulse_core::MetricsAggregator;
use pulse_core::http::RequestContext;
use pulse_core::models::{DateRange, ReportType};
use pulse_core::retry::RetryPolicy;
use pulse_core::traits::ReportSource;

#[derive(Parser)]
#[command(name = "pulse", version, about = "Daily engagement reports for Discourse forums")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Forum connection settings shared by every command.
#[derive(Args)]
struct ConnectionArgs {
    /// Forum base URL, including scheme
    #[arg(long, env = "PULSE_HOST")]
    host: String,

    /// Username the API key belongs to
    #[arg(long, env = "PULSE_API_USERNAME")]
    api_username: String,

    /// Admin API key (reads from PULSE_API_KEY env var if not provided)
    #[arg(long, env = "PULSE_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "PULSE_TIMEOUT_SECS")]
    timeout: Option<u64>,

    /// Seconds added to the server-requested wait when rate limited
    #[arg(long, default_value_t = 1)]
    backoff: u64,

    /// First day of the report (YYYY-MM-DD)
    #[arg(short, long)]
    start: NaiveDate,

    /// Last day of the report, inclusive (defaults to the start date)
    #[arg(short, long)]
    end: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate every engagement metric into a per-day CSV report
    Report {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Output CSV path (defaults to forum_report_<start>_to_<end>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch one raw bulk report and print its series as JSON
    Series {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Report name (e.g., "likes", "consolidated_page_views", "time_to_first_response")
        #[arg(short, long)]
        report: ReportType,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pulse=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Report { connection, output } => {
            let (client, range) = connect(&connection)?;
            let path = output.unwrap_or_else(|| output::default_output_path(&range));
            cmd_report(client, range, &path).await?;
        }
        Commands::Series { connection, report } => {
            let (client, range) = connect(&connection)?;
            cmd_series(client, report, range).await?;
        }
    }

    Ok(())
}

type Client = BulkReportClient<pulse_client::ReqwestTransport, pulse_core::TokioSleeper>;

/// Build the bulk report client and date range from the command line.
fn connect(args: &ConnectionArgs) -> Result<(Client, DateRange)> {
    let range = DateRange::new(args.start, args.end.unwrap_or(args.start))
        .map_err(|e| anyhow::anyhow!(e))?;

    let mut context = RequestContext::new(&args.host, &args.api_username, &args.api_key)
        .map_err(|e| anyhow::anyhow!(e))?;
    if let Some(secs) = args.timeout {
        context = context.with_timeout(Duration::from_secs(secs));
    }

    let policy = RetryPolicy {
        backoff: Duration::from_secs(args.backoff),
        ..RetryPolicy::default()
    };
    let executor = RequestExecutor::new(context)
        .context("Failed to create HTTP client")?
        .with_policy(policy);

    Ok((BulkReportClient::new(executor), range))
}

async fn cmd_report(client: Client, range: DateRange, output: &Path) -> Result<()> {
    tracing::info!(
        start = %range.start(),
        end = %range.end(),
        "Building engagement report"
    );

    let aggregator = MetricsAggregator::new(client, range);
    let report = aggregator
        .aggregate_by_date()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    output::write_report_file(&report, output)?;
    println!("Report written to {}", output.display());

    Ok(())
}

async fn cmd_series(client: Client, report: ReportType, range: DateRange) -> Result<()> {
    tracing::info!(%report, "Fetching raw report");

    let fetched = client
        .fetch_report(report, &range)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    println!("{}", serde_json::to_string_pretty(&fetched)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONNECTION: [&str; 6] = [
        "--host",
        "https://forum.example.com",
        "--api-username",
        "system",
        "--api-key",
        "secret",
    ];

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        let argv = std::iter::once("pulse")
            .chain(args.iter().copied())
            .chain(CONNECTION);
        Cli::try_parse_from(argv)
    }

    #[test]
    fn report_end_defaults_to_start() {
        let cli = parse(&["report", "--start", "2024-01-01"]).unwrap();
        let Commands::Report { connection, output } = cli.command else {
            panic!("expected report command");
        };
        assert!(output.is_none());
        assert_eq!(connection.backoff, 1);

        let (_, range) = connect(&connection).unwrap();
        assert_eq!(range.start(), range.end());
    }

    #[test]
    fn reversed_range_is_rejected() {
        let cli = parse(&["report", "--start", "2024-02-01", "--end", "2024-01-01"]).unwrap();
        let Commands::Report { connection, .. } = cli.command else {
            panic!("expected report command");
        };
        let err = connect(&connection).err().unwrap();
        assert!(err.to_string().contains("Invalid date range"));
    }

    #[test]
    fn bad_date_fails_to_parse() {
        assert!(parse(&["report", "--start", "01/02/2024"]).is_err());
    }

    #[test]
    fn series_takes_a_report_name() {
        let cli = parse(&["series", "--start", "2024-01-01", "--report", "time_to_first_response"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Series {
                report: ReportType::TimeToFirstResponse,
                ..
            }
        ));
        assert!(parse(&["series", "--start", "2024-01-01", "--report", "nope"]).is_err());
    }
}
