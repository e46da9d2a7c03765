//! One-time provisioning of the first assigned resource per volume.
//!
//! [`BootstrapCoordinator`] can run on every deployment. It inspects the
//! assigned count of every declared volume and then either creates and
//! assigns one resource per volume (all counts zero), reports a skip (all
//! counts one), or refuses with [`VolumeError::InvalidState`].
//!
//! The only guard against a concurrent bootstrap is a re-list immediately
//! before each create. Two runs can still interleave; the loser sees an
//! assigned resource and aborts with [`VolumeError::BootstrapAborted`], but a
//! create already submitted by either run is not rolled back.

use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::app::App;
use crate::volume::{
    AssignmentState, DiskCreateRequest, DiskOptions, FilesOptions, LogicalVolume, VolumeDisk,
    VolumeDriver, VolumeError, VolumeOptions, VolumeType,
};

/// Reason reported when the application declares no volumes.
pub const REASON_NO_VOLUMES: &str = "no volumes defined";

/// Reason reported when every volume already has one assigned resource.
pub const REASON_ALREADY_INITIALIZED: &str = "already initialized";

/// Overrides applied to every create issued by a bootstrap run.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BootstrapRequest {
    /// Zone for new disks, overriding the app deployment zone.
    pub zone: Option<String>,
    /// Options overlaid on every disk volume's declared options.
    pub disk_options: Option<DiskOptions>,
    /// Options overlaid on every files volume's declared options.
    pub files_options: Option<FilesOptions>,
}

impl BootstrapRequest {
    fn create_request(&self, volume: &LogicalVolume) -> DiskCreateRequest {
        let options = match volume.volume_type() {
            VolumeType::Disk => self.disk_options.clone().map(VolumeOptions::Disk),
            VolumeType::Files => self.files_options.clone().map(VolumeOptions::Files),
        };
        DiskCreateRequest {
            name: None,
            source: None,
            zone: self.zone.clone(),
            options,
        }
    }
}

/// Outcome of a bootstrap run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BootstrapReport {
    /// Resources created and assigned, in declaration order.
    pub created: Vec<VolumeDisk>,
    /// True when the run made no changes.
    pub skipped: bool,
    /// Why the run was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Elapsed time of the run.
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl BootstrapReport {
    fn skipped(reason: &str, duration: Duration) -> Self {
        Self {
            created: Vec::new(),
            skipped: true,
            reason: Some(reason.to_owned()),
            duration,
        }
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(duration.as_millis())
}

/// Decision taken from the per-volume assigned counts.
#[derive(Clone, Debug, Eq, PartialEq)]
enum BootstrapPlan {
    Provision,
    AlreadyInitialized,
    Refuse(Vec<AssignmentState>),
}

impl BootstrapPlan {
    fn from_states(mut states: Vec<AssignmentState>) -> Self {
        if states.iter().all(|state| state.assigned == 0) {
            return Self::Provision;
        }
        if states.iter().all(|state| state.assigned == 1) {
            return Self::AlreadyInitialized;
        }
        states.sort_by(|left, right| left.volume.cmp(&right.volume));
        Self::Refuse(states)
    }
}

fn assignment_state(volume: &str, disks: &[VolumeDisk]) -> AssignmentState {
    AssignmentState {
        volume: volume.to_owned(),
        assigned: disks.iter().filter(|disk| disk.assigned).count(),
        total: disks.len(),
    }
}

/// Runs bootstrap over any [`VolumeDriver`].
pub struct BootstrapCoordinator<'d, D: VolumeDriver + ?Sized> {
    driver: &'d D,
}

impl<'d, D: VolumeDriver + ?Sized> BootstrapCoordinator<'d, D> {
    /// Creates a coordinator over `driver`.
    #[must_use]
    pub const fn new(driver: &'d D) -> Self {
        Self { driver }
    }

    /// Ensures every declared volume has exactly one assigned resource.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::InvalidState`] when the assigned counts are
    /// mixed, [`VolumeError::BootstrapAborted`] when a concurrent run assigned
    /// a resource first, and any error raised by the driver.
    pub async fn bootstrap_all(
        &self,
        app: &App,
        request: &BootstrapRequest,
    ) -> Result<BootstrapReport, VolumeError> {
        let started = Instant::now();
        if app.volumes.is_empty() {
            info!(app = %app.name, "bootstrap skipped: {REASON_NO_VOLUMES}");
            return Ok(BootstrapReport::skipped(
                REASON_NO_VOLUMES,
                started.elapsed(),
            ));
        }

        let mut states = Vec::with_capacity(app.volumes.len());
        for volume in &app.volumes {
            let disks = self.driver.disk_list(app, &volume.name).await?;
            let state = assignment_state(&volume.name, &disks);
            debug!(volume = %state.volume, assigned = state.assigned, total = state.total, "volume state");
            states.push(state);
        }

        match BootstrapPlan::from_states(states) {
            BootstrapPlan::Provision => {
                let created = self.provision(app, request).await?;
                info!(app = %app.name, created = created.len(), "bootstrap complete");
                Ok(BootstrapReport {
                    created,
                    skipped: false,
                    reason: None,
                    duration: started.elapsed(),
                })
            }
            BootstrapPlan::AlreadyInitialized => {
                info!(app = %app.name, "bootstrap skipped: {REASON_ALREADY_INITIALIZED}");
                Ok(BootstrapReport::skipped(
                    REASON_ALREADY_INITIALIZED,
                    started.elapsed(),
                ))
            }
            BootstrapPlan::Refuse(refused) => {
                warn!(app = %app.name, "bootstrap refused: mixed assignment state");
                Err(VolumeError::InvalidState { states: refused })
            }
        }
    }

    async fn provision(
        &self,
        app: &App,
        request: &BootstrapRequest,
    ) -> Result<Vec<VolumeDisk>, VolumeError> {
        let mut created = Vec::with_capacity(app.volumes.len());
        for volume in &app.volumes {
            let current = self.driver.disk_list(app, &volume.name).await?;
            if current.iter().any(|disk| disk.assigned) {
                warn!(volume = %volume.name, "concurrent assignment detected");
                return Err(VolumeError::BootstrapAborted {
                    volume: volume.name.clone(),
                });
            }
            let create = request.create_request(volume);
            let mut disk = self.driver.disk_create(app, &volume.name, &create).await?;
            self.driver
                .disk_assign(app, &volume.name, &disk.name)
                .await?;
            disk.assigned = true;
            info!(volume = %volume.name, disk = %disk.name, "bootstrap assigned disk");
            created.push(disk);
        }
        Ok(created)
    }
}
