//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::azure::MAX_RESOURCE_PREFIX_LEN;
use crate::volume::OperationTimeouts;

/// Identity and timing settings shared by every provider.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "KOMPOX",
    discovery(
        app_name = "kompox",
        env_var = "KOMPOX_CONFIG_PATH",
        config_file_name = "kompox.toml",
        dotfile_name = ".kompox.toml",
        project_file_name = "kompox.toml"
    )
)]
pub struct KompoxConfig {
    /// Workspace name, the outermost scope of every resource hash.
    #[ortho_config(default = "default".to_owned())]
    pub workspace_name: String,
    /// Provider name within the workspace.
    #[ortho_config(default = "aks".to_owned())]
    pub provider_name: String,
    /// Prefix of generated resource group, disk and snapshot names.
    #[ortho_config(default = "kompox".to_owned())]
    pub resource_prefix: String,
    /// Deadline for list and lookup-by-tag operations, in seconds.
    #[ortho_config(default = 60)]
    pub read_timeout_secs: u64,
    /// Deadline for create, delete and assignment operations, in seconds.
    #[ortho_config(default = 120)]
    pub write_timeout_secs: u64,
    /// Deadline for source lookups, in seconds.
    #[ortho_config(default = 30)]
    pub lookup_timeout_secs: u64,
    /// Interval between long-running operation polls, in seconds.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
}

/// Azure Resource Manager credentials and endpoints.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "AZURE",
    discovery(
        app_name = "kompox",
        env_var = "KOMPOX_CONFIG_PATH",
        config_file_name = "kompox.toml",
        dotfile_name = ".kompox.toml",
        project_file_name = "kompox.toml"
    )
)]
pub struct AzureConfig {
    /// Subscription holding the app resource groups. Required.
    #[ortho_config(default = String::new())]
    pub subscription_id: String,
    /// Region for new resources. Required.
    #[ortho_config(default = String::new())]
    pub location: String,
    /// Entra ID tenant for the client-credentials flow.
    pub tenant_id: Option<String>,
    /// Application (client) id for the client-credentials flow.
    pub client_id: Option<String>,
    /// Client secret for the client-credentials flow.
    pub client_secret: Option<String>,
    /// Pre-acquired bearer token, used instead of client credentials.
    pub access_token: Option<String>,
    /// Resource Manager endpoint.
    #[ortho_config(default = "https://management.azure.com".to_owned())]
    pub management_endpoint: String,
    /// OAuth2 authority host.
    #[ortho_config(default = "https://login.microsoftonline.com".to_owned())]
    pub authority_host: String,
    /// DNS suffix of storage endpoints, used in share handles.
    #[ortho_config(default = "core.windows.net".to_owned())]
    pub storage_endpoint_suffix: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    section: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
        section: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            section,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to [{}] in kompox.toml",
            self.description, self.env_var, self.toml_key, self.section
        ))
    }
}

fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(metadata.missing());
    }
    Ok(())
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|raw| raw.trim()).filter(|raw| !raw.is_empty())
}

impl KompoxConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("kompox")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for empty names and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field(
            &self.workspace_name,
            &FieldMetadata::new(
                "workspace name",
                "KOMPOX_WORKSPACE_NAME",
                "workspace_name",
                "kompox",
            ),
        )?;
        require_field(
            &self.provider_name,
            &FieldMetadata::new(
                "provider name",
                "KOMPOX_PROVIDER_NAME",
                "provider_name",
                "kompox",
            ),
        )?;
        require_field(
            &self.resource_prefix,
            &FieldMetadata::new(
                "resource prefix",
                "KOMPOX_RESOURCE_PREFIX",
                "resource_prefix",
                "kompox",
            ),
        )?;
        if self.resource_prefix.len() > MAX_RESOURCE_PREFIX_LEN {
            return Err(ConfigError::Invalid(format!(
                "resource_prefix must be at most {MAX_RESOURCE_PREFIX_LEN} characters, got {}",
                self.resource_prefix.len()
            )));
        }
        for (key, value) in [
            ("read_timeout_secs", self.read_timeout_secs),
            ("write_timeout_secs", self.write_timeout_secs),
            ("lookup_timeout_secs", self.lookup_timeout_secs),
            ("poll_interval_secs", self.poll_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be greater than zero"
                )));
            }
        }
        Ok(())
    }

    /// Per-operation deadlines.
    #[must_use]
    pub const fn timeouts(&self) -> OperationTimeouts {
        OperationTimeouts {
            read: Duration::from_secs(self.read_timeout_secs),
            write: Duration::from_secs(self.write_timeout_secs),
            lookup: Duration::from_secs(self.lookup_timeout_secs),
        }
    }

    /// Interval between long-running operation polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// How requests to Resource Manager are authenticated.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AzureAuth {
    /// A bearer token supplied by the caller.
    AccessToken(String),
    /// OAuth2 client-credentials flow.
    ClientSecret {
        /// Entra ID tenant.
        tenant_id: String,
        /// Application (client) id.
        client_id: String,
        /// Client secret.
        client_secret: String,
    },
}

impl AzureConfig {
    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("kompox")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// or no credentials are configured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field(
            &self.subscription_id,
            &FieldMetadata::new(
                "Azure subscription ID",
                "AZURE_SUBSCRIPTION_ID",
                "subscription_id",
                "azure",
            ),
        )?;
        require_field(
            &self.location,
            &FieldMetadata::new("Azure location", "AZURE_LOCATION", "location", "azure"),
        )?;
        require_field(
            &self.management_endpoint,
            &FieldMetadata::new(
                "Resource Manager endpoint",
                "AZURE_MANAGEMENT_ENDPOINT",
                "management_endpoint",
                "azure",
            ),
        )?;
        self.auth().map(|_| ())
    }

    /// Selects the authentication method. A static access token wins over
    /// client credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when neither a token nor a
    /// complete set of client credentials is configured.
    pub fn auth(&self) -> Result<AzureAuth, ConfigError> {
        if let Some(token) = non_blank(self.access_token.as_ref()) {
            return Ok(AzureAuth::AccessToken(token.to_owned()));
        }
        let tenant_id = non_blank(self.tenant_id.as_ref()).ok_or_else(|| {
            FieldMetadata::new("Azure tenant ID", "AZURE_TENANT_ID", "tenant_id", "azure")
                .missing()
        })?;
        let client_id = non_blank(self.client_id.as_ref()).ok_or_else(|| {
            FieldMetadata::new("Azure client ID", "AZURE_CLIENT_ID", "client_id", "azure")
                .missing()
        })?;
        let client_secret = non_blank(self.client_secret.as_ref()).ok_or_else(|| {
            FieldMetadata::new(
                "Azure client secret",
                "AZURE_CLIENT_SECRET",
                "client_secret",
                "azure",
            )
            .missing()
        })?;
        Ok(AzureAuth::ClientSecret {
            tenant_id: tenant_id.to_owned(),
            client_id: client_id.to_owned(),
            client_secret: client_secret.to_owned(),
        })
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configured value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn kompox() -> KompoxConfig {
        KompoxConfig {
            workspace_name: String::from("default"),
            provider_name: String::from("aks"),
            resource_prefix: String::from("kompox"),
            read_timeout_secs: 60,
            write_timeout_secs: 120,
            lookup_timeout_secs: 30,
            poll_interval_secs: 5,
        }
    }

    #[fixture]
    fn azure() -> AzureConfig {
        AzureConfig {
            subscription_id: String::from("00000000-0000-0000-0000-000000000000"),
            location: String::from("westeurope"),
            tenant_id: Some(String::from("tenant")),
            client_id: Some(String::from("client")),
            client_secret: Some(String::from("secret")),
            access_token: None,
            management_endpoint: String::from("https://management.azure.com"),
            authority_host: String::from("https://login.microsoftonline.com"),
            storage_endpoint_suffix: String::from("core.windows.net"),
        }
    }

    #[rstest]
    fn default_kompox_config_is_valid(kompox: KompoxConfig) {
        kompox.validate().expect("defaults validate");
        assert_eq!(kompox.timeouts(), OperationTimeouts::default());
        assert_eq!(kompox.poll_interval(), Duration::from_secs(5));
    }

    #[rstest]
    fn long_resource_prefix_is_rejected(mut kompox: KompoxConfig) {
        kompox.resource_prefix = "x".repeat(MAX_RESOURCE_PREFIX_LEN + 1);
        let err = kompox.validate().expect_err("prefix too long");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[rstest]
    fn zero_timeout_is_rejected(mut kompox: KompoxConfig) {
        kompox.write_timeout_secs = 0;
        let err = kompox.validate().expect_err("zero timeout");
        assert!(err.to_string().contains("write_timeout_secs"));
    }

    #[rstest]
    fn missing_subscription_names_env_var_and_key(mut azure: AzureConfig) {
        azure.subscription_id = String::from("  ");
        let err = azure.validate().expect_err("subscription required");
        let message = err.to_string();
        assert!(message.contains("AZURE_SUBSCRIPTION_ID"));
        assert!(message.contains("subscription_id"));
        assert!(message.contains("kompox.toml"));
    }

    #[rstest]
    fn access_token_takes_precedence(mut azure: AzureConfig) {
        azure.access_token = Some(String::from("token"));
        assert_eq!(
            azure.auth().expect("token configured"),
            AzureAuth::AccessToken(String::from("token"))
        );
    }

    #[rstest]
    fn incomplete_client_credentials_are_rejected(mut azure: AzureConfig) {
        azure.client_secret = None;
        let err = azure.auth().expect_err("secret missing");
        assert!(err.to_string().contains("AZURE_CLIENT_SECRET"));
    }
}
