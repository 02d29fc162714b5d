mod commands;
mod error;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use labcompare::config::{load_config, Config};
use labcompare::models::ComparisonStatus;
use labcompare::LabCompareError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

use commands::{Context, ListArgs};
use error::CliError;

#[derive(Parser)]
#[command(
    name = "labcompare",
    version,
    about = "Compare lab test reports over time and track comparison jobs"
)]
struct Cli {
    /// Config file (JSON or YAML)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use the local SQLite backend instead of the comparison service
    #[arg(long, global = true)]
    local: bool,

    /// Directory holding structured report sidecars for --local
    /// (defaults to the directory of the first submitted file)
    #[arg(long, global = true, value_name = "DIR")]
    sidecars: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload 2-10 reports for comparison and wait for the result
    Submit {
        /// Report files (PDF, JPEG or PNG)
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,

        #[arg(short, long)]
        patient: String,

        /// Comparison name (defaults to "Test Comparison - <today>")
        #[arg(short, long)]
        name: Option<String>,

        /// Extra instructions for the analysis
        #[arg(long)]
        prompt: Option<String>,

        /// Print the job id and return without polling
        #[arg(long)]
        no_wait: bool,
    },
    /// Show a comparison as currently stored
    Status { id: String },
    /// Poll an existing comparison until it settles
    Wait { id: String },
    /// List comparisons, newest first
    List {
        #[arg(long, value_parser = parse_status)]
        status: Option<ComparisonStatus>,
        #[arg(long)]
        patient: Option<String>,
        #[arg(long)]
        doctor: Option<String>,
        /// Created on or after (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Created on or before (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        page: Option<u64>,
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Delete a comparison
    Delete { id: String },
    /// Counts by status and month
    Stats,
    /// Compare structured report JSON files offline
    Analyze {
        #[arg(required = true, num_args = 1..)]
        reports: Vec<PathBuf>,
    },
}

fn parse_status(raw: &str) -> Result<ComparisonStatus, String> {
    ComparisonStatus::parse(&raw.to_ascii_lowercase()).ok_or_else(|| {
        format!("unknown status '{raw}' (expected pending, processing, completed or failed)")
    })
}

fn init_logging(verbose: bool, json: bool) -> Result<(), CliError> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);
    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let installed = if json {
        tracing::subscriber::set_global_default(registry.with(fmt.json()))
    } else {
        tracing::subscriber::set_global_default(registry.with(fmt))
    };
    installed.map_err(|e| CliError::Logging(e.to_string()))?;

    // Library crates log through the `log` facade.
    tracing_log::LogTracer::init().map_err(|e| CliError::Logging(e.to_string()))
}

fn load(path: Option<&PathBuf>) -> Result<Config, CliError> {
    match path {
        Some(path) => Ok(load_config(path).map_err(LabCompareError::from)?),
        None => Ok(Config::default()),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load(cli.config.as_ref())?;

    if let Commands::Analyze { reports } = &cli.command {
        return commands::analyze(&config, reports);
    }

    let ctx = if cli.local {
        let sidecars = cli.sidecars.clone().unwrap_or_else(|| match &cli.command {
            Commands::Submit { files, .. } => files
                .first()
                .and_then(|f| f.parent())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            _ => PathBuf::from("."),
        });
        Context::local(config, sidecars)?
    } else {
        Context::http(config)?
    };

    let result = match cli.command {
        Commands::Submit {
            files,
            patient,
            name,
            prompt,
            no_wait,
        } => {
            commands::submit(
                &ctx,
                &files,
                &patient,
                name.as_deref(),
                prompt.as_deref(),
                no_wait,
            )
            .await
        }
        Commands::Status { id } => commands::status(&ctx, &id).await,
        Commands::Wait { id } => commands::wait(&ctx, &id).await,
        Commands::List {
            status,
            patient,
            doctor,
            from,
            to,
            page,
            limit,
        } => {
            let args = ListArgs {
                status,
                patient,
                doctor,
                from,
                to,
                page,
                limit,
            };
            commands::list(&ctx, args).await
        }
        Commands::Delete { id } => commands::delete(&ctx, &id).await,
        Commands::Stats => commands::stats(&ctx).await,
        Commands::Analyze { .. } => Ok(()),
    };

    ctx.finish().await;
    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_json) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}
