//! Configuration loading from the environment.

use std::time::Duration;

use kompox_volume::test_support::EnvGuard;
use kompox_volume::{AzureConfig, DriverSettings, KompoxConfig};

#[tokio::test]
async fn environment_overrides_reach_driver_settings() {
    let _guard = EnvGuard::set_vars(&[
        ("KOMPOX_WORKSPACE_NAME", "staging"),
        ("KOMPOX_READ_TIMEOUT_SECS", "15"),
        ("AZURE_SUBSCRIPTION_ID", "11111111-2222-3333-4444-555555555555"),
        ("AZURE_LOCATION", "northeurope"),
        ("AZURE_ACCESS_TOKEN", "static-token"),
        ("AZURE_STORAGE_ENDPOINT_SUFFIX", "core.chinacloudapi.cn"),
    ])
    .await;

    let kompox = KompoxConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("kompox config should load: {err}"));
    let azure = AzureConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("azure config should load: {err}"));
    assert_eq!(kompox.workspace_name, "staging");
    assert_eq!(kompox.provider_name, "aks");

    let settings = DriverSettings::from_config(&azure, &kompox)
        .unwrap_or_else(|err| panic!("settings should build: {err}"));
    assert_eq!(settings.location, "northeurope");
    assert_eq!(settings.storage_endpoint_suffix, "core.chinacloudapi.cn");
    assert_eq!(settings.timeouts.read, Duration::from_secs(15));
    assert_eq!(settings.timeouts.write, Duration::from_secs(120));
}

#[tokio::test]
async fn oversized_resource_prefix_fails_settings() {
    let _guard = EnvGuard::set_vars(&[
        ("KOMPOX_RESOURCE_PREFIX", "a-resource-prefix-that-is-far-too-long"),
        ("AZURE_SUBSCRIPTION_ID", "11111111-2222-3333-4444-555555555555"),
        ("AZURE_LOCATION", "northeurope"),
        ("AZURE_ACCESS_TOKEN", "static-token"),
    ])
    .await;

    let kompox = KompoxConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("kompox config should load: {err}"));
    let azure = AzureConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("azure config should load: {err}"));
    let err = DriverSettings::from_config(&azure, &kompox).expect_err("prefix too long");
    assert!(
        err.to_string().contains("resource_prefix"),
        "error should name the key: {err}"
    );
}
