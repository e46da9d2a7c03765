//! Shared fixtures for bootstrap BDD scenarios.

use std::sync::{Arc, Mutex, MutexGuard};

use kompox_volume::azure::ResourceNamer;
use kompox_volume::test_support::InMemoryCloud;
use kompox_volume::volume::{DiskOptions, FilesOptions};
use kompox_volume::{
    App, AzureVolumes, BootstrapReport, DriverSettings, LogicalVolume, VolumeOptions,
};
use rstest::fixture;

#[derive(Clone, Debug)]
pub enum BootstrapOutcome {
    Report(BootstrapReport),
    Failure(String),
}

/// Scenario state. Clones share the same cloud, so steps observe each
/// other's changes however the fixture is threaded through.
#[derive(Clone)]
pub struct BootstrapContext {
    pub cloud: Arc<InMemoryCloud>,
    pub volumes: Arc<AzureVolumes<InMemoryCloud>>,
    pub app: Arc<Mutex<App>>,
    pub outcome: Arc<Mutex<Option<BootstrapOutcome>>>,
    pub mutations_before: Arc<Mutex<usize>>,
}

impl BootstrapContext {
    pub fn app(&self) -> App {
        lock(&self.app).clone()
    }

    pub fn set_app(&self, app: App) {
        *lock(&self.app) = app;
    }

    pub fn outcome(&self) -> Option<BootstrapOutcome> {
        lock(&self.outcome).clone()
    }

    pub fn record(&self, outcome: BootstrapOutcome) {
        *lock(&self.outcome) = Some(outcome);
    }

    pub fn mark_mutations(&self) {
        *lock(&self.mutations_before) = self.cloud.mutations();
    }

    pub fn mutations_since_mark(&self) -> usize {
        self.cloud.mutations() - *lock(&self.mutations_before)
    }
}

pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|err| panic!("bootstrap context lock poisoned: {err}"))
}

#[fixture]
pub fn bootstrap_context() -> BootstrapContext {
    let cloud = Arc::new(InMemoryCloud::new());
    let namer = ResourceNamer::new("ws", "aks", "kompox")
        .unwrap_or_else(|err| panic!("namer should be valid: {err}"));
    let volumes = AzureVolumes::new(
        Arc::clone(&cloud),
        DriverSettings::new(namer, "westeurope"),
    );
    BootstrapContext {
        cloud,
        volumes: Arc::new(volumes),
        app: Arc::new(Mutex::new(App::new("web"))),
        outcome: Arc::new(Mutex::new(None)),
        mutations_before: Arc::new(Mutex::new(0)),
    }
}

pub fn two_volume_app(disk: &str, files: &str) -> App {
    App::new("web")
        .with_zone("1")
        .with_volume(LogicalVolume::new(
            disk,
            8 << 30,
            VolumeOptions::Disk(DiskOptions::default()),
        ))
        .with_volume(LogicalVolume::new(
            files,
            16 << 30,
            VolumeOptions::Files(FilesOptions::default()),
        ))
}
