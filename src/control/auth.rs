//! Short-lived bearer credentials for the control plane.
//!
//! Every acquisition is a full round trip to the identity provider — no
//! memoization. A failure aborts the enclosing orchestration stage and is
//! never retried here.

use crate::config::IdentityConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("identity provider rejected the token request with status {status}")]
    Rejected { status: u16 },
    #[error("token response carried no usable access token")]
    MalformedResponse,
}

/// Bearer credential for the control plane. Debug output never leaks the
/// secret.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(redacted)")
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn acquire(&self) -> Result<AccessToken, AuthError>;
}

/// Client-credentials grant against the identity provider's token endpoint.
pub struct ClientSecretCredential {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
}

impl ClientSecretCredential {
    pub fn new(identity: &IdentityConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .build()?;
        let base = identity.token_endpoint.trim_end_matches('/');
        let token_url = format!("{base}/{}/oauth2/v2.0/token", identity.tenant_id);

        Ok(Self {
            client,
            token_url,
            client_id: identity.client_id.clone(),
            client_secret: identity.client_secret.clone(),
            scope: identity.scope.clone(),
        })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[async_trait]
impl CredentialProvider for ClientSecretCredential {
    async fn acquire(&self) -> Result<AccessToken, AuthError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            });
        }

        let payload: TokenResponse = response.json().await?;
        match payload.access_token {
            Some(token) if !token.is_empty() => Ok(AccessToken::new(token)),
            _ => Err(AuthError::MalformedResponse),
        }
    }
}
