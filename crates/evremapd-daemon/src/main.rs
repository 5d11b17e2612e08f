//! evremapd daemon
//!
//! Grabs configured input devices and rewrites their event streams onto
//! per-device virtual outputs according to the remap tables.

mod context;
mod device;
mod error;
mod executor;
mod matcher;
mod output;
mod session;
mod sink;
mod tasks;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use evremapd_config::ResolvedDevice;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

use crate::context::NoContext;
use crate::output::Output;
use crate::session::Session;
use crate::sink::UinputSink;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "evremapd")]
#[command(about = "Input event remapping daemon")]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config_path: PathBuf = match args.config {
        Some(path) => shellexpand::tilde(&path).into_owned().into(),
        None => evremapd_config::default_config_path()
            .context("no config directory available; pass --config")?,
    };

    tracing::info!("loading configuration from {}", config_path.display());
    let config = evremapd_config::load_config(&config_path)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sessions = JoinSet::new();

    // An unavailable device is reported and skipped so the other devices
    // keep remapping
    for spec in config.devices {
        match start_session(spec, shutdown_rx.clone()) {
            Ok(session) => {
                sessions.spawn(session.run());
            }
            Err(err) => tracing::warn!(error = %err, "skipping device"),
        }
    }
    if sessions.is_empty() {
        bail!("no configured device could be started");
    }
    tracing::info!("{} session(s) running", sessions.len());

    let mut sigterm = signal(SignalKind::terminate())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = sigterm.recv() => break,
            joined = sessions.join_next() => match joined {
                Some(Ok(Err(err))) => tracing::warn!(error = %err, "session ended with error"),
                Some(Ok(Ok(()))) => {}
                Some(Err(err)) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Some(Err(_)) => {}
                None => bail!("all sessions have terminated"),
            },
        }
    }

    tracing::info!("shutting down");
    let _ = shutdown_tx.send(true);
    let drain = async {
        while sessions.join_next().await.is_some() {}
    };
    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        tracing::warn!("timed out waiting for sessions to stop");
    }
    Ok(())
}

fn start_session(spec: ResolvedDevice, shutdown: watch::Receiver<bool>) -> Result<Session> {
    let name = spec.describe();
    if spec.table.is_empty() {
        tracing::warn!(device = %name, "device has no remappings; events pass through unchanged");
    }
    let input = device::find_and_grab(&spec)?;
    let sink = UinputSink::build(&spec.output_name, &input, &spec.table)
        .with_context(|| format!("creating output device for '{name}'"))?;
    let stream = input
        .into_event_stream()
        .with_context(|| format!("event stream for '{name}'"))?;
    tracing::info!(device = %name, "grabbed input device");
    Ok(Session::new(
        name,
        stream,
        spec.table,
        Output::shared(Box::new(sink)),
        Box::new(NoContext),
        shutdown,
    ))
}
