use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use netatmo_snapshots::auth::{CredentialStore, TokenAuthority};
use netatmo_snapshots::client::{ApiTransport, HttpTransport};
use netatmo_snapshots::detect::{Detector, HttpDetector};
use netatmo_snapshots::events::{parse_timestamp, DeviceFilter, EventSource, HomeSelector, TimeWindow};
use netatmo_snapshots::providers::NetatmoProvider;
use netatmo_snapshots::snapshots::{DetectionSink, SnapshotFetcher};
use netatmo_snapshots::{pipeline, Config, SnapshotError};

/// Fetch Netatmo camera snapshots and run them through object detection.
#[derive(Parser)]
#[command(name = "netatmo-snapshots")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Home id to query (wins over --home)
    #[arg(long, env = "NETATMO_HOME_ID", global = true)]
    home_id: Option<String>,

    /// Home name to query (looked up through the home listing)
    #[arg(long, env = "NETATMO_HOME_NAME", global = true)]
    home: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the homes of the account
    Homes,

    /// Show the modules of the selected home
    Status,

    /// List recent events of the selected home
    Events {
        /// Device type, e.g. NOC for the outdoor camera
        #[arg(long)]
        device_type: Option<String>,
        /// Number of events to request
        #[arg(long)]
        size: Option<u32>,
    },

    /// List snapshot URLs inside a time window
    Snapshots(SelectArgs),

    /// Download snapshots and run detection on each
    Run {
        #[command(flatten)]
        select: SelectArgs,
        /// Object classes to keep
        #[arg(long, value_delimiter = ',', default_value = "person")]
        classes: Vec<String>,
        /// Only download the snapshots, skip detection
        #[arg(long)]
        download_only: bool,
        /// Also save the full snapshot next to the crops
        #[arg(long)]
        keep_original: bool,
        /// Output directory (defaults to OUTPUT_DIR)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Args)]
struct SelectArgs {
    /// Device type, e.g. NOC for the outdoor camera
    #[arg(long, default_value = "NOC")]
    device_type: String,
    /// Only this module (MAC address)
    #[arg(long)]
    module: Option<String>,
    /// Number of events to request
    #[arg(long)]
    size: Option<u32>,
    /// Look back this many seconds from now
    #[arg(long)]
    since: Option<u64>,
    /// Window start (RFC 3339 or unix seconds)
    #[arg(long)]
    from: Option<String>,
    /// Window end (RFC 3339 or unix seconds)
    #[arg(long)]
    to: Option<String>,
}

impl SelectArgs {
    fn window(&self) -> Result<TimeWindow, SnapshotError> {
        TimeWindow::from_parts(
            self.since.map(Duration::from_secs),
            self.from.as_deref().map(parse_timestamp).transpose()?,
            self.to.as_deref().map(parse_timestamp).transpose()?,
        )
    }

    fn filter(&self) -> DeviceFilter {
        DeviceFilter::new(Some(self.device_type.clone())).with_module(self.module.clone())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "netatmo_snapshots=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let provider = NetatmoProvider::new(config.token_url.as_str(), config.http_timeout)?;
    let store = CredentialStore::new(&config.credentials_file);
    let mut authority = TokenAuthority::load(Box::new(provider), store, config.refresh_margin)
        .with_context(|| format!("Failed to load credentials from {}", config.credentials_file.display()))?;

    let outcome = execute(&cli, &config, &mut authority).await;

    if let Err(e) = &outcome {
        if let Some(SnapshotError::CredentialPersist { .. }) = e.downcast_ref::<SnapshotError>() {
            error!("Rotated refresh token was lost; update the credentials file by hand before the next run");
        }
    }
    let shutdown = authority.shutdown();
    outcome?;
    shutdown?;
    Ok(())
}

async fn execute(cli: &Cli, config: &Config, authority: &mut TokenAuthority) -> Result<()> {
    let transport: Arc<dyn ApiTransport> = Arc::new(HttpTransport::new(config.http_timeout)?);

    let home = match (&cli.home_id, &cli.home) {
        (Some(id), _) => HomeSelector::Id(id.clone()),
        (None, Some(name)) => HomeSelector::Name(name.clone()),
        (None, None) => HomeSelector::First,
    };
    let source = EventSource::new(transport.clone(), config.api_url.clone(), home);

    match &cli.command {
        Commands::Homes => print_json(&source.list_homes(authority).await?),
        Commands::Status => print_json(&source.home_status(authority).await?),
        Commands::Events { device_type, size } => print_json(
            &source
                .list_events(authority, device_type.as_deref(), *size)
                .await?,
        ),
        Commands::Snapshots(select) => {
            let window = select.window()?;
            let refs = source
                .with_size(select.size)
                .get_snapshot_references(authority, &select.filter(), &window)
                .await?;
            print_json(&refs)
        }
        Commands::Run {
            select,
            classes,
            download_only,
            keep_original,
            output_dir,
        } => {
            let window = select.window()?;

            let detector: Option<Box<dyn Detector>> = if *download_only {
                None
            } else {
                let url = config
                    .detector_url
                    .clone()
                    .context("DETECTOR_URL is required unless --download-only is given")?;
                Some(Box::new(HttpDetector::new(url, config.http_timeout)?))
            };
            let sink = DetectionSink::new(
                output_dir.clone().unwrap_or_else(|| config.output_dir.clone()),
                *keep_original || *download_only,
            )
            .await?;

            let refs = source
                .with_size(select.size)
                .get_snapshot_references(authority, &select.filter(), &window)
                .await?;
            info!(count = refs.len(), dir = %sink.dir().display(), "Processing snapshots");

            let fetcher = SnapshotFetcher::new(transport);
            let summary = pipeline::run(
                authority,
                &refs,
                &fetcher,
                detector.as_deref(),
                &sink,
                classes,
            )
            .await?;
            print_json(&summary)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
