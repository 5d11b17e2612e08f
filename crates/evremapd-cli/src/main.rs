//! evremapd CLI
//!
//! Offline companion to the daemon: validates configurations, lists input
//! devices, and dumps raw event streams for writing remappings.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use evdev::{Device, EventType, Key, RelativeAxisType};

#[derive(Parser, Debug)]
#[command(name = "evremap")]
#[command(about = "Inspection tool for evremapd")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration file
    Validate,

    /// List available input devices
    Devices,

    /// Print events from one input device
    Events {
        /// Device node path, event number, device name, or phys
        device: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate => cmd_validate(cli.config),
        Commands::Devices => cmd_devices(),
        Commands::Events { device } => cmd_events(&device),
    }
}

fn config_path(arg: Option<String>) -> Result<PathBuf> {
    match arg {
        Some(path) => Ok(shellexpand::tilde(&path).into_owned().into()),
        None => evremapd_config::default_config_path()
            .context("no config directory available; pass --config"),
    }
}

fn cmd_validate(config_arg: Option<String>) -> Result<()> {
    let path = config_path(config_arg)?;
    println!("Validating configuration: {}", path.display());

    let config = evremapd_config::load_config(&path)?;
    println!("Configuration is valid");
    println!("  Devices: {}", config.devices.len());
    for device in &config.devices {
        println!(
            "    - {} -> {} ({} remapping(s))",
            device.describe(),
            device.output_name,
            device.table.rules().len()
        );
    }
    Ok(())
}

fn cmd_devices() -> Result<()> {
    println!("Available input devices:\n");

    let mut paths: Vec<PathBuf> = std::fs::read_dir("/dev/input")?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("event"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    for path in paths {
        match Device::open(&path) {
            Ok(device) => {
                println!("  {}", device.name().unwrap_or("Unknown"));
                println!("    Path: {}", path.display());
                if let Some(phys) = device.physical_path() {
                    println!("    Phys: {phys}");
                }
                println!();
            }
            Err(e) => tracing::debug!("could not open {}: {e}", path.display()),
        }
    }
    Ok(())
}

/// Resolve a user-supplied identifier to a device: a node path, a bare
/// event number, or a name/phys to scan for.
fn open_device(ident: &str) -> Result<Device> {
    if ident.starts_with('/') {
        return Device::open(ident).with_context(|| format!("opening {ident}"));
    }
    if ident.chars().all(|c| c.is_ascii_digit()) {
        let path = format!("/dev/input/event{ident}");
        return Device::open(&path).with_context(|| format!("opening {path}"));
    }
    for entry in std::fs::read_dir("/dev/input")?.flatten() {
        let path = entry.path();
        if !path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("event"))
            .unwrap_or(false)
        {
            continue;
        }
        if let Ok(device) = Device::open(&path) {
            if device.name() == Some(ident) || device.physical_path() == Some(ident) {
                return Ok(device);
            }
        }
    }
    bail!("no input device matches '{ident}'");
}

fn cmd_events(ident: &str) -> Result<()> {
    let mut device = open_device(ident)?;
    println!(
        "Reading events from {} (Ctrl-C to stop)\n",
        device.name().unwrap_or("Unknown")
    );

    loop {
        for event in device.fetch_events().context("reading events")? {
            match event.event_type() {
                EventType::SYNCHRONIZATION => {}
                EventType::KEY => {
                    println!("{:?} {}", Key::new(event.code()), event.value());
                }
                EventType::RELATIVE => {
                    println!("{:?} {}", RelativeAxisType(event.code()), event.value());
                }
                other => {
                    println!("{:?} code={} value={}", other, event.code(), event.value());
                }
            }
        }
    }
}
