//! Binary entrypoint for inky-frame.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, fmt};

use inky_frame::config::{Configuration, Overrides};
use inky_frame::display::ScriptDisplay;
use inky_frame::events::CycleOutcome;
use inky_frame::immich::ImmichClient;
use inky_frame::tasks::frame::Frame;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

#[derive(Debug, Parser)]
#[command(
    name = "inky-frame",
    version,
    about = "Show random Immich photos on an e-paper picture frame"
)]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Immich server URL
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Immich API key
    #[arg(long, value_name = "KEY")]
    api_key: Option<String>,

    /// Minutes between images
    #[arg(long, value_name = "MINUTES")]
    interval_minutes: Option<u64>,

    /// Script that renders the image on the panel
    #[arg(long, value_name = "FILE")]
    display_script: Option<PathBuf>,

    /// Where the downloaded image is written
    #[arg(long, value_name = "FILE")]
    image_path: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    fmt()
        .with_env_filter(log_filter(verbosity, rust_log.as_deref())?)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialise logging: {err}"))?;
    Ok(())
}

/// `RUST_LOG` is used as given unless `-v` was passed, which then raises the
/// crate's own level on top of it.
fn log_filter(verbosity: u8, rust_log: Option<&str>) -> Result<EnvFilter> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let crate_directive = || {
        format!("inky_frame={level}")
            .parse()
            .context("invalid log directive")
    };

    match rust_log.map(str::trim).filter(|directives| !directives.is_empty()) {
        Some(directives) => {
            let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));
            if verbosity == 0 {
                Ok(filter)
            } else {
                Ok(filter.add_directive(crate_directive()?))
            }
        }
        None => Ok(EnvFilter::new("info").add_directive(crate_directive()?)),
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = try_main().await {
        error!(error = ?err, "inky-frame exited with error");
        std::process::exit(1);
    }
}

async fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;
    info!(version = env!("CARGO_PKG_VERSION"), "inky-frame starting up");

    let mut cfg = Configuration::load(cli.config.as_deref())?;
    cfg.apply_process_env()
        .context("invalid environment override")?;
    cfg.apply_overrides(Overrides {
        base_url: cli.base_url,
        api_key: cli.api_key,
        rotation_interval_minutes: cli.interval_minutes,
        display_script: cli.display_script,
        image_path: cli.image_path,
    });
    let cfg = cfg.validated().context("invalid configuration values")?;
    tracing::debug!("effective configuration: {:#?}", cfg);

    let client = ImmichClient::from_config(&cfg).context("failed to create Immich client")?;
    info!(base_url = %client.base_url(), "connecting to Immich");
    info!(
        minutes = cfg.rotation_interval_minutes,
        "image rotation interval"
    );

    let frame = Frame::new(client, ScriptDisplay::from_config(&cfg), &cfg);

    if cli.once {
        return match frame.run_cycle().await.context("display cycle failed")? {
            CycleOutcome::Displayed { asset_id, .. } => {
                info!(asset_id = %asset_id, "single cycle complete");
                Ok(())
            }
            CycleOutcome::NoSuitableAsset => {
                info!("single cycle complete; nothing to display");
                Ok(())
            }
        };
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            info!("ctrl-c received; shutting down");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::spawn(async move {
                    if sigterm.recv().await.is_some() {
                        info!("SIGTERM received; shutting down");
                        cancel.cancel();
                    }
                });
            }
            Err(err) => tracing::warn!("failed to register SIGTERM handler: {err}"),
        }
    }

    frame.run(cancel).await;
    Ok(())
}
