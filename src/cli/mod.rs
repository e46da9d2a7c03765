//! Command-line interface definitions for the `kompox-volume` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `kompox-volume` binary.
#[derive(Debug, Parser)]
#[command(
    name = "kompox-volume",
    about = "Manage the disks and snapshots backing an application's volumes",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Path to the application manifest (JSON).
    #[arg(long, short = 'A', value_name = "PATH", env = "KOMPOX_APP_MANIFEST")]
    pub(crate) app: String,
    /// Operation to perform.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Operations exposed by the binary.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Manage the disks or file shares backing a volume.
    #[command(subcommand)]
    Disk(DiskCommand),
    /// Manage snapshots of a disk volume.
    #[command(subcommand)]
    Snapshot(SnapshotCommand),
    /// Print the provisioning descriptor for a volume.
    Class(VolumeArg),
    /// Create and assign the first disk of every volume, once.
    Bootstrap(BootstrapArgs),
}

/// Selects a logical volume.
#[derive(Debug, Args)]
pub(crate) struct VolumeArg {
    /// Logical volume name as declared in the manifest.
    #[arg(long, short = 'V', value_name = "VOLUME")]
    pub(crate) volume: String,
}

/// Disk subcommands.
#[derive(Debug, Subcommand)]
pub(crate) enum DiskCommand {
    /// List the disks of a volume, newest first.
    List(VolumeArg),
    /// Create an unassigned disk.
    Create(DiskCreateArgs),
    /// Delete a disk. Deleting a missing disk succeeds.
    Delete(DiskTargetArgs),
    /// Make a disk the volume's only assigned disk.
    Assign(DiskTargetArgs),
}

/// Arguments for `disk create`.
#[derive(Debug, Args)]
pub(crate) struct DiskCreateArgs {
    #[command(flatten)]
    pub(crate) volume: VolumeArg,
    /// Disk name; a compact id is generated when omitted.
    #[arg(long, short = 'N', value_name = "NAME")]
    pub(crate) name: Option<String>,
    /// Copy source: a disk or snapshot name, `disk:NAME`, `snapshot:NAME`,
    /// or a resource id starting with `/`.
    #[arg(long, short = 'S', value_name = "SOURCE")]
    pub(crate) source: Option<String>,
    /// Zone override; defaults to the app deployment zone.
    #[arg(long, short = 'Z', value_name = "ZONE")]
    pub(crate) zone: Option<String>,
    /// Option override applied over the declared volume options.
    #[arg(long = "option", short = 'O', value_name = "KEY=VALUE")]
    pub(crate) options: Vec<String>,
}

/// Arguments naming one disk.
#[derive(Debug, Args)]
pub(crate) struct DiskTargetArgs {
    #[command(flatten)]
    pub(crate) volume: VolumeArg,
    /// Disk name within the volume.
    #[arg(long, short = 'D', value_name = "DISK")]
    pub(crate) disk: String,
}

/// Snapshot subcommands.
#[derive(Debug, Subcommand)]
pub(crate) enum SnapshotCommand {
    /// List the snapshots of a volume, newest first.
    List(VolumeArg),
    /// Snapshot a disk of the volume.
    Create(SnapshotCreateArgs),
    /// Delete a snapshot. Deleting a missing snapshot succeeds.
    Delete(SnapshotTargetArgs),
    /// Create a new disk from a snapshot.
    Restore(SnapshotRestoreArgs),
}

/// Arguments for `snapshot create`.
#[derive(Debug, Args)]
pub(crate) struct SnapshotCreateArgs {
    #[command(flatten)]
    pub(crate) volume: VolumeArg,
    /// Snapshot name; a compact id is generated when omitted.
    #[arg(long, short = 'N', value_name = "NAME")]
    pub(crate) name: Option<String>,
    /// Disk to snapshot; the assigned disk when omitted.
    #[arg(long, short = 'S', value_name = "SOURCE")]
    pub(crate) source: Option<String>,
}

/// Arguments naming one snapshot.
#[derive(Debug, Args)]
pub(crate) struct SnapshotTargetArgs {
    #[command(flatten)]
    pub(crate) volume: VolumeArg,
    /// Snapshot name within the volume.
    #[arg(long, value_name = "SNAPSHOT")]
    pub(crate) snapshot: String,
}

/// Arguments for `snapshot restore`.
#[derive(Debug, Args)]
pub(crate) struct SnapshotRestoreArgs {
    #[command(flatten)]
    pub(crate) target: SnapshotTargetArgs,
    /// Name of the new disk; a compact id is generated when omitted.
    #[arg(long, short = 'N', value_name = "NAME")]
    pub(crate) name: Option<String>,
    /// Zone override; defaults to the app deployment zone.
    #[arg(long, short = 'Z', value_name = "ZONE")]
    pub(crate) zone: Option<String>,
}

/// Arguments for `bootstrap`.
#[derive(Debug, Args)]
pub(crate) struct BootstrapArgs {
    /// Zone for every created disk, overriding the app deployment zone.
    #[arg(long, short = 'Z', value_name = "ZONE")]
    pub(crate) zone: Option<String>,
}
