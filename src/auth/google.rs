//! Federated identity lookup.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// Profile vouched for by an identity provider.
#[derive(Debug, Clone)]
pub struct FederatedProfile {
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// Resolves a provider access token to a verified profile.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn fetch_profile(&self, access_token: &str) -> Result<FederatedProfile>;
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

/// Google OAuth userinfo endpoint client.
pub struct GoogleIdentity {
    client: reqwest::Client,
    userinfo_url: String,
}

impl GoogleIdentity {
    pub fn new(userinfo_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            userinfo_url: userinfo_url.into(),
        }
    }
}

fn rejected() -> AppError {
    AppError::InvalidCredential("Google authentication failed".to_string())
}

#[async_trait]
impl IdentityProvider for GoogleIdentity {
    async fn fetch_profile(&self, access_token: &str) -> Result<FederatedProfile> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Google userinfo request failed: {}", e);
                rejected()
            })?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "Google rejected access token");
            return Err(rejected());
        }

        let info: UserInfo = response.json().await.map_err(|e| {
            tracing::warn!("Invalid Google userinfo response: {}", e);
            rejected()
        })?;

        if info.email_verified == Some(false) {
            return Err(AppError::InvalidCredential(
                "Google account email is not verified".to_string(),
            ));
        }

        let email = info.email.filter(|e| !e.is_empty()).ok_or_else(rejected)?;

        Ok(FederatedProfile {
            email,
            name: info.name,
            picture: info.picture,
        })
    }
}
