//! Admin-API authentication.
//!
//! One password-grant token is obtained at connect time and used for the
//! whole pass; a batch run is short enough that refresh is not needed.

use reqwest::Client;
use serde::Deserialize;

use rostersync_core::{SyncError, SyncResult};

fn default_auth_realm() -> String {
    "master".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// Connection settings for the admin REST API.
///
/// The [`Debug`] impl redacts the password to keep credentials out of logs.
#[derive(Clone, Deserialize)]
pub struct RestConfig {
    /// Base URL of the identity server (no trailing slash required).
    pub base_url: String,
    /// Realm the managed users and client live in.
    pub realm: String,
    /// Realm the admin account authenticates against.
    #[serde(default = "default_auth_realm")]
    pub auth_realm: String,
    /// Admin username.
    pub username: String,
    /// Admin password.
    pub password: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for RestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestConfig")
            .field("base_url", &self.base_url)
            .field("realm", &self.realm)
            .field("auth_realm", &self.auth_realm)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Obtain an access token through the password grant.
pub async fn obtain_token(http: &Client, config: &RestConfig) -> SyncResult<String> {
    let url = format!(
        "{}/realms/{}/protocol/openid-connect/token",
        config.base_url.trim_end_matches('/'),
        config.auth_realm
    );
    let params = [
        ("grant_type", "password"),
        ("client_id", "admin-cli"),
        ("username", config.username.as_str()),
        ("password", config.password.as_str()),
    ];
    let response = http
        .post(&url)
        .form(&params)
        .send()
        .await
        .map_err(|e| SyncError::remote("admin login", e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::Remote {
            context: "admin login".to_string(),
            message: format!("token endpoint returned {status}"),
        });
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| SyncError::remote("admin login", e))?;
    Ok(token.access_token)
}
