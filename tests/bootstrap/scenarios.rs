//! BDD scenarios for bootstrap.

use rstest_bdd_macros::scenario;

use super::test_helpers::{BootstrapContext, bootstrap_context};

#[scenario(
    path = "tests/features/bootstrap.feature",
    name = "Provision one assigned disk per volume"
)]
fn scenario_provision(bootstrap_context: BootstrapContext) {
    let _ = bootstrap_context;
}

#[scenario(
    path = "tests/features/bootstrap.feature",
    name = "Skip an application that is already initialized"
)]
fn scenario_already_initialized(bootstrap_context: BootstrapContext) {
    let _ = bootstrap_context;
}

#[scenario(
    path = "tests/features/bootstrap.feature",
    name = "Refuse a mixed assignment state"
)]
fn scenario_mixed_state(bootstrap_context: BootstrapContext) {
    let _ = bootstrap_context;
}

#[scenario(
    path = "tests/features/bootstrap.feature",
    name = "Skip an application without volumes"
)]
fn scenario_no_volumes(bootstrap_context: BootstrapContext) {
    let _ = bootstrap_context;
}
