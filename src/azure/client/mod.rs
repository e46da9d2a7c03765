//! Azure Resource Manager REST client.
//!
//! Requests go through a shared `reqwest` client with bearer authentication.
//! Long-running `PUT`, `PATCH` and `DELETE` operations are polled through the
//! `Azure-AsyncOperation` or `Location` header until they reach a terminal
//! state.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Method, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::sleep;
use tracing::debug;

use crate::config::{AzureAuth, AzureConfig, ConfigError, KompoxConfig};

use super::ApiError;

mod auth;
mod compute;
mod models;
mod storage;

use auth::{ClientSecret, Credential};
use models::{ErrorEnvelope, OperationStatus, Page};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const ASYNC_OPERATION: &str = "azure-asyncoperation";

pub(crate) const COMPUTE_API_VERSION: &str = "2023-04-02";
pub(crate) const STORAGE_API_VERSION: &str = "2023-01-01";
pub(crate) const RESOURCES_API_VERSION: &str = "2021-04-01";

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Client for one subscription.
pub struct ArmClient {
    endpoint: Url,
    subscription_id: String,
    credential: Credential,
    poll_interval: Duration,
    operation_timeout: Duration,
}

impl ArmClient {
    /// Builds a client from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the Azure configuration is incomplete or
    /// the management endpoint is not a URL.
    pub fn from_config(azure: &AzureConfig, kompox: &KompoxConfig) -> Result<Self, ConfigError> {
        azure.validate()?;
        let endpoint = Url::parse(azure.management_endpoint.trim_end_matches('/'))
            .map_err(|err| ConfigError::Invalid(format!("management_endpoint: {err}")))?;
        let credential = match azure.auth()? {
            AzureAuth::AccessToken(token) => Credential::Static(token),
            AzureAuth::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            } => Credential::client_secret(ClientSecret {
                authority_host: azure.authority_host.clone(),
                tenant_id,
                client_id,
                client_secret,
                scope: format!("{}/.default", azure.management_endpoint.trim_end_matches('/')),
            }),
        };
        Ok(Self {
            endpoint,
            subscription_id: azure.subscription_id.clone(),
            credential,
            poll_interval: kompox.poll_interval(),
            operation_timeout: kompox.timeouts().write,
        })
    }

    /// Builds the URL of a resource below the subscription.
    fn resource_url(&self, segments: &[&str], api_version: &str) -> Result<Url, ApiError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Transport(format!("invalid endpoint {}", self.endpoint)))?
            .pop_if_empty()
            .push("subscriptions")
            .push(&self.subscription_id)
            .extend(segments);
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    fn resource_group_url(
        &self,
        resource_group: &str,
        segments: &[&str],
        api_version: &str,
    ) -> Result<Url, ApiError> {
        let mut full = vec!["resourceGroups", resource_group];
        full.extend_from_slice(segments);
        self.resource_url(&full, api_version)
    }

    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Response, ApiError> {
        let token = self.credential.token().await?;
        debug!(%method, url = %url.path(), "ARM request");
        let mut request = HTTP_CLIENT.request(method, url.clone()).bearer_auth(token);
        if let Some(payload) = body {
            request = request.json(payload);
        }
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(error_from_response(url.path(), response).await)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let response = self.send::<Value>(Method::GET, url, None).await?;
        Ok(response.json().await?)
    }

    /// Fetches every page of a list endpoint.
    pub(crate) async fn list_json<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut next = Some(url);
        while let Some(page_url) = next {
            let page: Page<T> = self.get_json(page_url).await?;
            items.extend(page.value);
            next = page
                .next_link
                .filter(|link| !link.is_empty())
                .map(|link| Url::parse(&link))
                .transpose()
                .map_err(|err| ApiError::Decode(format!("invalid nextLink: {err}")))?;
        }
        Ok(items)
    }

    /// Issues a mutation and waits for it to settle.
    pub(crate) async fn mutate<B: Serialize + Sync>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<(), ApiError> {
        let response = self.send(method, url.clone(), body).await?;
        if response.status() != StatusCode::ACCEPTED
            && response.status() != StatusCode::CREATED
        {
            return Ok(());
        }
        let Some(monitor) = operation_monitor(response.headers()) else {
            return Ok(());
        };
        self.wait_for_operation(url.path(), monitor).await
    }

    /// Issues a `PUT` and returns the resource once provisioning finishes.
    pub(crate) async fn put_and_fetch<B, T>(&self, url: Url, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        self.mutate(Method::PUT, url.clone(), Some(body)).await?;
        self.get_json(url).await
    }

    async fn wait_for_operation(&self, target: &str, monitor: Monitor) -> Result<(), ApiError> {
        let deadline = Instant::now() + self.operation_timeout;
        while Instant::now() <= deadline {
            sleep(self.poll_interval).await;
            let response = self
                .send::<Value>(Method::GET, monitor.url.clone(), None)
                .await?;
            match monitor.kind {
                MonitorKind::AsyncOperation => {
                    let status: OperationStatus = response.json().await?;
                    if let Some(result) = status.terminal() {
                        return result;
                    }
                }
                MonitorKind::Location => {
                    if response.status() != StatusCode::ACCEPTED {
                        return Ok(());
                    }
                }
            }
            debug!(resource = target, "operation still running");
        }
        Err(ApiError::Timeout(target.to_owned()))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum MonitorKind {
    AsyncOperation,
    Location,
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct Monitor {
    kind: MonitorKind,
    url: Url,
}

fn operation_monitor(headers: &HeaderMap) -> Option<Monitor> {
    let header = |name| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Url::parse(value).ok())
    };
    header(ASYNC_OPERATION)
        .map(|url| Monitor {
            kind: MonitorKind::AsyncOperation,
            url,
        })
        .or_else(|| {
            header(LOCATION.as_str()).map(|url| Monitor {
                kind: MonitorKind::Location,
                url,
            })
        })
}

async fn error_from_response(resource: &str, response: Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    classify_error(resource, status, &body)
}

fn classify_error(resource: &str, status: StatusCode, body: &str) -> ApiError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let (code, message) = envelope.map_or_else(
        || (String::new(), body.to_owned()),
        |env| (env.error.code, env.error.message),
    );
    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound {
            resource: resource.to_owned(),
        },
        StatusCode::CONFLICT => ApiError::Conflict {
            resource: resource.to_owned(),
            message,
        },
        StatusCode::UNAUTHORIZED => ApiError::Auth(message),
        other => ApiError::Http {
            status: other.as_u16(),
            code,
            message,
        },
    }
}
