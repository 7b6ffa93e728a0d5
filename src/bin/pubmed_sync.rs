use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use pubmed_sync::app::{App, RunPlan, RunResult};
use pubmed_sync::azure::AzureBlobClient;
use pubmed_sync::config::{ConfigLoader, Credentials, ResolvedConfig, StorageBackend};
use pubmed_sync::error::SyncError;
use pubmed_sync::fetcher::{Fetcher, ThreadSleepPacer};
use pubmed_sync::merge::merge_with_summary;
use pubmed_sync::ncbi::EutilsHttpClient;
use pubmed_sync::output::{JsonOutput, LogSink};
use pubmed_sync::storage::{BlobStore, FsBlobStore};

#[derive(Parser)]
#[command(name = "pubmed-sync")]
#[command(about = "Fetch PubMed records and fold them into a cumulative CSV in blob storage")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch, merge with the stored dataset and upload (scheduled entry point)")]
    Run(ConfigArgs),
    #[command(about = "Fetch the configured query into a local CSV only")]
    Fetch(FetchArgs),
    #[command(about = "Merge two local dataset files")]
    Merge(MergeArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long)]
    config: Option<String>,
}

#[derive(Args)]
struct FetchArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    out: PathBuf,
}

#[derive(Args)]
struct MergeArgs {
    #[arg(long)]
    previous: Option<PathBuf>,

    #[arg(long)]
    fresh: PathBuf,

    #[arg(long)]
    out: PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<SyncError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SyncError) -> u8 {
    match error {
        SyncError::ConfigRead(_)
        | SyncError::ConfigParse(_)
        | SyncError::InvalidConnectionString(_)
        | SyncError::MissingCredential(_) => 2,
        SyncError::EutilsHttp(_)
        | SyncError::EutilsStatus { .. }
        | SyncError::EutilsParse(_)
        | SyncError::StorageHttp(_)
        | SyncError::StorageStatus { .. }
        | SyncError::BlobNotFound { .. }
        | SyncError::ContainerNotFound(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run_scheduled(args),
        Commands::Fetch(args) => run_fetch(args),
        Commands::Merge(args) => run_merge(args),
    }
}

fn run_scheduled(args: ConfigArgs) -> miette::Result<()> {
    let config = ConfigLoader::resolve(args.config.as_deref())?;
    let credentials = Credentials::from_env();
    let client = EutilsHttpClient::new(credentials.entrez_identity())?;
    let store = open_store(&config, &credentials)?;
    let app = App::new(client, store, ThreadSleepPacer);
    let plan = RunPlan::from_config(&config);

    tracing::info!(
        container = %plan.container,
        blob = %plan.blob_name,
        work_dir = %plan.work_dir,
        "starting run"
    );
    let attempted = config
        .retry
        .run(&ThreadSleepPacer, |attempt| {
            tracing::info!(attempt, "run attempt");
            app.run(&plan, &LogSink)
        })?;
    let result = RunResult {
        attempts: attempted.attempts,
        ..attempted.value
    };
    JsonOutput::print_run(&result).into_diagnostic()?;
    Ok(())
}

fn run_fetch(args: FetchArgs) -> miette::Result<()> {
    let config = ConfigLoader::resolve(args.config.as_deref())?;
    let credentials = Credentials::from_env();
    let client = EutilsHttpClient::new(credentials.entrez_identity())?;
    let fetcher = Fetcher::new(client, ThreadSleepPacer);
    let summary = fetcher.fetch_with_summary(&config.query, config.max_results, &args.out)?;
    JsonOutput::print_fetch(&summary).into_diagnostic()?;
    Ok(())
}

fn run_merge(args: MergeArgs) -> miette::Result<()> {
    let summary = merge_with_summary(args.previous.as_deref(), &args.fresh, &args.out)?;
    JsonOutput::print_merge(&summary).into_diagnostic()?;
    Ok(())
}

fn open_store(
    config: &ResolvedConfig,
    credentials: &Credentials,
) -> Result<Box<dyn BlobStore>, SyncError> {
    match &config.storage {
        StorageBackend::Azure => {
            let client = AzureBlobClient::from_connection_string(credentials.connection_string()?)?;
            Ok(Box::new(client))
        }
        StorageBackend::Filesystem(root) => Ok(Box::new(FsBlobStore::new(root.clone()))),
    }
}
