use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harvester::pipeline::Pipeline;
use harvester::proxy::ProxyRotator;
use harvester::storage::PostgresStorage;
use harvester::{export, input, BrowserSession, Config};

#[derive(Debug, Parser)]
#[command(name = "harvester", about = "Job listing harvester")]
struct Cli {
    /// CSV of searches to run (Role, Location, Domain, Software, Limit).
    #[arg(short, long, default_value = "input.csv")]
    input: PathBuf,

    /// Optional CSV export of the records this run accepted.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Initialize logging: stdout plus a non-blocking file sink.
    let file_appender = tracing_appender::rolling::never(
        config
            .log_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new(".")),
        config
            .log_file
            .file_name()
            .context("LOG_FILE has no file name")?,
    );
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,harvester=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    tracing::info!("Starting job harvester");

    let rows = input::read_input(&cli.input)?;
    tracing::info!(searches = rows.len(), input = %cli.input.display(), "loaded input");

    let storage = PostgresStorage::connect(&config.database_url).await?;

    let rotator = if config.proxy_servers.is_empty() {
        tracing::info!("no proxies configured, connecting directly");
        None
    } else {
        let rotator = ProxyRotator::new(
            config.proxy_servers.clone(),
            config.proxy_credentials.clone(),
            config.proxy_extension_dir.clone(),
        )?;
        if rotator.requires_auth() {
            rotator.write_auth_extension()?;
        }
        Some(rotator)
    };

    let (proxy_arg, extension_dir) = match &rotator {
        Some(r) => (
            Some(r.chrome_arg_value()),
            r.requires_auth().then(|| r.extension_dir().to_path_buf()),
        ),
        None => (None, None),
    };
    let browser = BrowserSession::launch(config.headless, proxy_arg, extension_dir.as_deref())?;

    let mut pipeline = Pipeline::new(&browser, &storage, &config, rotator);
    let accepted = pipeline.run(&rows).await?;
    tracing::info!(accepted = accepted.len(), "run complete");

    if let Some(output) = &cli.output {
        export::write_export(output, &accepted)?;
    }

    Ok(())
}
