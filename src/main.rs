//! Binary entry point for the `kompox-volume` CLI.

use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use kompox_volume::{
    App, ArmClient, AzureConfig, AzureVolumes, BootstrapCoordinator, BootstrapRequest,
    ConfigError, DiskCreateRequest, DriverSettings, KompoxConfig, ManifestError,
    SnapshotCreateRequest, VolumeDriver, VolumeError, VolumeOptions,
};

mod cli;

use cli::{
    BootstrapArgs, Cli, Command, DiskCommand, DiskCreateArgs, SnapshotCommand,
    SnapshotRestoreArgs,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Volume(#[from] VolumeError),
    #[error("invalid option `{0}`: expected KEY=VALUE")]
    InvalidOption(String),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
    #[error("interrupted")]
    Interrupted,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let outcome = until_interrupted(dispatch(cli), tokio::signal::ctrl_c()).await;
    if let Err(err) = outcome {
        report_error(&err);
        process::exit(1);
    }
}

/// Runs `work` until it finishes or `interrupt` resolves successfully. A
/// signal handler that fails to install leaves `work` running.
async fn until_interrupted(
    work: impl Future<Output = Result<(), CliError>>,
    interrupt: impl Future<Output = io::Result<()>>,
) -> Result<(), CliError> {
    tokio::select! {
        result = work => result,
        Ok(()) = interrupt => Err(CliError::Interrupted),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let app = App::load(&Utf8PathBuf::from(cli.app))?;
    let kompox = KompoxConfig::load_without_cli_args()?;
    let azure = AzureConfig::load_without_cli_args()?;
    let settings = DriverSettings::from_config(&azure, &kompox)?;
    let client = ArmClient::from_config(&azure, &kompox)?;
    let volumes = AzureVolumes::new(Arc::new(client), settings);
    execute(&volumes, &app, cli.command, &mut io::stdout()).await
}

async fn execute(
    driver: &dyn VolumeDriver,
    app: &App,
    command: Command,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Command::Disk(DiskCommand::List(args)) => {
            write_json(out, &driver.disk_list(app, &args.volume).await?)
        }
        Command::Disk(DiskCommand::Create(args)) => {
            let request = disk_create_request(app, &args)?;
            let disk = driver
                .disk_create(app, &args.volume.volume, &request)
                .await?;
            write_json(out, &disk)
        }
        Command::Disk(DiskCommand::Delete(args)) => {
            driver
                .disk_delete(app, &args.volume.volume, &args.disk)
                .await?;
            write_json(
                out,
                &json!({ "volume": args.volume.volume, "disk": args.disk, "deleted": true }),
            )
        }
        Command::Disk(DiskCommand::Assign(args)) => {
            driver
                .disk_assign(app, &args.volume.volume, &args.disk)
                .await?;
            write_json(
                out,
                &json!({ "volume": args.volume.volume, "disk": args.disk, "assigned": true }),
            )
        }
        Command::Snapshot(SnapshotCommand::List(args)) => {
            write_json(out, &driver.snapshot_list(app, &args.volume).await?)
        }
        Command::Snapshot(SnapshotCommand::Create(args)) => {
            let request = SnapshotCreateRequest {
                name: args.name,
                source: args.source,
            };
            let snapshot = driver
                .snapshot_create(app, &args.volume.volume, &request)
                .await?;
            write_json(out, &snapshot)
        }
        Command::Snapshot(SnapshotCommand::Delete(args)) => {
            driver
                .snapshot_delete(app, &args.volume.volume, &args.snapshot)
                .await?;
            write_json(
                out,
                &json!({ "volume": args.volume.volume, "snapshot": args.snapshot, "deleted": true }),
            )
        }
        Command::Snapshot(SnapshotCommand::Restore(args)) => {
            let request = restore_request(&args);
            let disk = driver
                .disk_create(app, &args.target.volume.volume, &request)
                .await?;
            write_json(out, &disk)
        }
        Command::Class(args) => {
            let volume = app.find_volume(&args.volume)?;
            write_json(out, &driver.class(volume))
        }
        Command::Bootstrap(BootstrapArgs { zone }) => {
            let request = BootstrapRequest {
                zone,
                ..BootstrapRequest::default()
            };
            let report = BootstrapCoordinator::new(driver)
                .bootstrap_all(app, &request)
                .await?;
            write_json(out, &report)
        }
    }
}

fn disk_create_request(app: &App, args: &DiskCreateArgs) -> Result<DiskCreateRequest, CliError> {
    let volume = app.find_volume(&args.volume.volume)?;
    let options = if args.options.is_empty() {
        None
    } else {
        let raw = parse_options(&args.options)?;
        Some(VolumeOptions::parse(volume.volume_type(), &raw)?)
    };
    Ok(DiskCreateRequest {
        name: args.name.clone(),
        source: args.source.clone(),
        zone: args.zone.clone(),
        options,
    })
}

fn restore_request(args: &SnapshotRestoreArgs) -> DiskCreateRequest {
    DiskCreateRequest {
        name: args.name.clone(),
        source: Some(format!("snapshot:{}", args.target.snapshot)),
        zone: args.zone.clone(),
        options: None,
    }
}

/// Parses `KEY=VALUE` pairs; values that read as JSON (numbers, booleans)
/// keep their type, anything else is a string.
fn parse_options(pairs: &[String]) -> Result<Map<String, Value>, CliError> {
    pairs
        .iter()
        .map(|pair| {
            let (key, raw) = pair
                .split_once('=')
                .filter(|(name, _)| !name.trim().is_empty())
                .ok_or_else(|| CliError::InvalidOption(pair.clone()))?;
            let value = serde_json::from_str::<Value>(raw)
                .ok()
                .filter(|parsed| !parsed.is_object() && !parsed.is_array())
                .unwrap_or_else(|| Value::String(raw.to_owned()));
            Ok((key.trim().to_owned(), value))
        })
        .collect()
}

fn write_json<T: Serialize + ?Sized>(out: &mut impl Write, value: &T) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value).map_err(io::Error::from)?;
    writeln!(out)?;
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "error: {err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
