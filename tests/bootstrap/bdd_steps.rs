//! BDD step definitions for bootstrap behaviour.

use std::future::Future;

use kompox_volume::{
    BootstrapCoordinator, BootstrapRequest, DiskCreateRequest, VolumeDriver, VolumeError,
};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{BootstrapContext, BootstrapOutcome, two_volume_app};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Volume(#[from] VolumeError),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn block_on<F: Future>(future: F) -> F::Output {
    Runtime::new()
        .unwrap_or_else(|err| panic!("tokio runtime should start: {err}"))
        .block_on(future)
}

fn run_bootstrap(context: &BootstrapContext) -> BootstrapOutcome {
    let app = context.app();
    block_on(async {
        BootstrapCoordinator::new(context.volumes.as_ref())
            .bootstrap_all(&app, &BootstrapRequest::default())
            .await
    })
    .map_or_else(
        |err| BootstrapOutcome::Failure(err.to_string()),
        BootstrapOutcome::Report,
    )
}

#[given("an application with disk volume \"{disk}\" and files volume \"{files}\"")]
fn application_with_volumes(
    bootstrap_context: BootstrapContext,
    disk: String,
    files: String,
) -> BootstrapContext {
    bootstrap_context.set_app(two_volume_app(disk.trim(), files.trim()));
    bootstrap_context
}

#[given("an application without volumes")]
fn application_without_volumes(bootstrap_context: BootstrapContext) -> BootstrapContext {
    bootstrap_context
}

#[given("the application was bootstrapped before")]
fn bootstrapped_before(bootstrap_context: BootstrapContext) -> Result<BootstrapContext, StepError> {
    match run_bootstrap(&bootstrap_context) {
        BootstrapOutcome::Report(report) if !report.skipped => Ok(bootstrap_context),
        other => Err(StepError::Assertion(format!(
            "initial bootstrap should create resources, got {other:?}"
        ))),
    }
}

#[given("volume \"{volume}\" already has an assigned disk")]
fn volume_has_assigned_disk(
    bootstrap_context: BootstrapContext,
    volume: String,
) -> Result<BootstrapContext, StepError> {
    let app = bootstrap_context.app();
    let driver = bootstrap_context.volumes.as_ref();
    block_on(async {
        let disk = driver
            .disk_create(&app, volume.trim(), &DiskCreateRequest::new().name("manual"))
            .await?;
        driver.disk_assign(&app, volume.trim(), &disk.name).await
    })?;
    Ok(bootstrap_context)
}

#[when("I bootstrap the application")]
fn bootstrap_application(bootstrap_context: BootstrapContext) -> BootstrapContext {
    bootstrap_context.mark_mutations();
    let outcome = run_bootstrap(&bootstrap_context);
    bootstrap_context.record(outcome);
    bootstrap_context
}

#[then("the bootstrap created {count} resources")]
fn bootstrap_created(bootstrap_context: &BootstrapContext, count: usize) -> Result<(), StepError> {
    match bootstrap_context.outcome() {
        Some(BootstrapOutcome::Report(report))
            if !report.skipped && report.created.len() == count =>
        {
            Ok(())
        }
        other => Err(StepError::Assertion(format!(
            "expected {count} created resources, got {other:?}"
        ))),
    }
}

#[then("every volume has exactly one assigned resource")]
fn every_volume_assigned(bootstrap_context: &BootstrapContext) -> Result<(), StepError> {
    let app = bootstrap_context.app();
    let driver = bootstrap_context.volumes.as_ref();
    for volume in &app.volumes {
        let disks = block_on(driver.disk_list(&app, &volume.name))?;
        let assigned = disks.iter().filter(|disk| disk.assigned).count();
        if assigned != 1 {
            return Err(StepError::Assertion(format!(
                "volume {} has {assigned} assigned resources",
                volume.name
            )));
        }
    }
    Ok(())
}

#[then("the bootstrap is skipped because \"{reason}\"")]
fn bootstrap_skipped(bootstrap_context: &BootstrapContext, reason: String) -> Result<(), StepError> {
    match bootstrap_context.outcome() {
        Some(BootstrapOutcome::Report(report))
            if report.skipped && report.reason.as_deref() == Some(reason.as_str()) =>
        {
            Ok(())
        }
        other => Err(StepError::Assertion(format!(
            "expected skip because {reason}, got {other:?}"
        ))),
    }
}

#[then("the bootstrap fails with \"{message}\"")]
fn bootstrap_fails(bootstrap_context: &BootstrapContext, message: String) -> Result<(), StepError> {
    match bootstrap_context.outcome() {
        Some(BootstrapOutcome::Failure(actual)) if actual == message => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected failure `{message}`, got {other:?}"
        ))),
    }
}

#[then("no resources were created by the last run")]
fn nothing_created(bootstrap_context: &BootstrapContext) -> Result<(), StepError> {
    match bootstrap_context.mutations_since_mark() {
        0 => Ok(()),
        count => Err(StepError::Assertion(format!(
            "expected no mutations, saw {count}"
        ))),
    }
}
