//! Password-grant login against the identity provider.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument};

use crate::errors::ApiError;
use crate::store::SessionStore;

/// Token endpoint response. Only `access_token` is used.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer credential.
    pub access_token: String,
    /// Lifetime in seconds, when the provider reports one.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Token type (normally `Bearer`).
    #[serde(default)]
    pub token_type: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// OAuth2 client that establishes the session on successful login.
#[derive(Clone, Debug)]
pub struct IdentityClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    session: Arc<SessionStore>,
}

impl IdentityClient {
    /// Create a client for `token_url` acting as `client_id`.
    pub fn new(
        http: reqwest::Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        session: Arc<SessionStore>,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            client_id: client_id.into(),
            session,
        }
    }

    /// Exchange username and password for a credential and establish the session.
    #[instrument(skip_all, fields(username = %username))]
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("username", username),
            ("password", password),
            ("grant_type", "password"),
        ];

        let response = self.http.post(&self.token_url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = serde_json::from_str(&response.text().await?)?;
        self.session.establish(token.access_token.clone(), username);
        info!("login succeeded");
        Ok(token)
    }

    /// Clear the session.
    pub fn logout(&self) {
        self.session.clear();
    }
}
