//! Bearer tokens for Azure Resource Manager.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::azure::ApiError;

use super::HTTP_CLIENT;

/// Tokens are refreshed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

pub(crate) struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Client-credentials parameters for the OAuth2 token endpoint.
pub(crate) struct ClientSecret {
    pub(crate) authority_host: String,
    pub(crate) tenant_id: String,
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) scope: String,
}

pub(crate) enum Credential {
    Static(String),
    ClientSecret {
        params: ClientSecret,
        cache: Mutex<Option<CachedToken>>,
    },
}

impl Credential {
    pub(crate) fn client_secret(params: ClientSecret) -> Self {
        Self::ClientSecret {
            params,
            cache: Mutex::new(None),
        }
    }

    pub(crate) async fn token(&self) -> Result<String, ApiError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::ClientSecret { params, cache } => {
                let mut guard = cache.lock().await;
                if let Some(cached) = guard
                    .as_ref()
                    .filter(|cached| Instant::now() < cached.refresh_at)
                {
                    return Ok(cached.value.clone());
                }
                let fresh = request_token(params).await?;
                let value = fresh.value.clone();
                *guard = Some(fresh);
                Ok(value)
            }
        }
    }
}

async fn request_token(params: &ClientSecret) -> Result<CachedToken, ApiError> {
    let url = format!(
        "{}/{}/oauth2/v2.0/token",
        params.authority_host.trim_end_matches('/'),
        params.tenant_id
    );
    debug!(tenant = %params.tenant_id, client = %params.client_id, "requesting ARM token");
    let response = HTTP_CLIENT
        .post(&url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", params.client_id.as_str()),
            ("client_secret", params.client_secret.as_str()),
            ("scope", params.scope.as_str()),
        ])
        .send()
        .await
        .map_err(|err| ApiError::Auth(err.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Auth(format!("token endpoint returned {status}: {body}")));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|err| ApiError::Auth(err.to_string()))?;
    let lifetime = Duration::from_secs(token.expires_in).saturating_sub(REFRESH_MARGIN);
    Ok(CachedToken {
        value: token.access_token,
        refresh_at: Instant::now() + lifetime,
    })
}
