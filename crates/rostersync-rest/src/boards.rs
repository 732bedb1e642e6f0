//! Board system REST client.
//!
//! The board server exposes a small JSON API authenticated with a login
//! token. Membership records carry an `isActive` flag; the adapter maps
//! them onto [`BoardMember`] without interpreting them.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use rostersync_boards::traits::{BoardMutation, BoardQuery};
use rostersync_boards::types::{Board, BoardMember};
use rostersync_core::{SyncError, SyncResult};
use rostersync_directory::types::Username;

fn default_timeout_secs() -> u64 {
    30
}

/// Connection settings for the board REST API.
///
/// The [`Debug`] impl redacts the password to keep credentials out of logs.
#[derive(Clone, Deserialize)]
pub struct BoardRestConfig {
    /// Base URL of the board server (no trailing slash required).
    pub base_url: String,
    /// Admin username.
    pub username: String,
    /// Admin password.
    pub password: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for BoardRestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardRestConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BoardRepresentation {
    #[serde(rename = "_id")]
    id: String,
    slug: String,
    title: String,
}

impl From<BoardRepresentation> for Board {
    fn from(rep: BoardRepresentation) -> Self {
        Board {
            id: rep.id,
            slug: rep.slug,
            title: rep.title,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberRepresentation {
    username: String,
    #[serde(default)]
    is_active: bool,
    #[serde(default)]
    is_admin: bool,
}

impl From<MemberRepresentation> for BoardMember {
    fn from(rep: MemberRepresentation) -> Self {
        BoardMember {
            username: Username::new(rep.username),
            active: rep.is_active,
            is_admin: rep.is_admin,
        }
    }
}

/// Board adapter over the board server's REST API.
pub struct RestBoards {
    http: Client,
    base_url: String,
    token: String,
}

impl RestBoards {
    /// Build the HTTP client and authenticate.
    pub async fn connect(config: &BoardRestConfig) -> SyncResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("rostersync/0.1")
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let token = login(&http, &base_url, config).await?;
        debug!(base_url = %base_url, "authenticated against board API");
        Ok(Self { http, base_url, token })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    async fn expect_success(&self, response: Response, context: &str) -> SyncResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SyncError::Remote {
            context: context.to_string(),
            message: format!("{status}: {body}"),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        context: &str,
    ) -> SyncResult<T> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SyncError::remote(context, e))?;
        let response = self.expect_success(response, context).await?;
        response.json().await.map_err(|e| SyncError::remote(context, e))
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
        context: &str,
    ) -> SyncResult<()> {
        let response = self
            .http
            .request(method, self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| SyncError::remote(context, e))?;
        self.expect_success(response, context).await?;
        Ok(())
    }

    fn member_path(board: &Board, username: &Username) -> String {
        format!("/boards/{}/members/{}", board.id, username)
    }
}

async fn login(http: &Client, base_url: &str, config: &BoardRestConfig) -> SyncResult<String> {
    let context = "board login";
    let body = serde_json::json!({
        "username": config.username,
        "password": config.password,
    });
    let response = http
        .post(format!("{base_url}/users/login"))
        .json(&body)
        .send()
        .await
        .map_err(|e| SyncError::remote(context, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::Remote {
            context: context.to_string(),
            message: format!("login endpoint returned {status}"),
        });
    }
    let login: LoginResponse = response
        .json()
        .await
        .map_err(|e| SyncError::remote(context, e))?;
    Ok(login.token)
}

#[async_trait]
impl BoardQuery for RestBoards {
    async fn list_boards(&self) -> SyncResult<Vec<Board>> {
        let reps: Vec<BoardRepresentation> = self.get_json("/boards", "board listing").await?;
        Ok(reps.into_iter().map(Board::from).collect())
    }

    async fn list_members(&self, board: &Board) -> SyncResult<Vec<BoardMember>> {
        let path = format!("/boards/{}/members", board.id);
        let reps: Vec<MemberRepresentation> =
            self.get_json(&path, "board member listing").await?;
        Ok(reps.into_iter().map(BoardMember::from).collect())
    }
}

#[async_trait]
impl BoardMutation for RestBoards {
    async fn insert_active(&self, board: &Board, username: &Username) -> SyncResult<()> {
        let path = format!("/boards/{}/members", board.id);
        let body = serde_json::json!({ "username": username, "isActive": true });
        self.send_json(reqwest::Method::POST, &path, &body, "membership insertion")
            .await
    }

    async fn activate(&self, board: &Board, username: &Username) -> SyncResult<()> {
        let body = serde_json::json!({ "isActive": true });
        self.send_json(
            reqwest::Method::PUT,
            &Self::member_path(board, username),
            &body,
            "membership activation",
        )
        .await
    }

    async fn deactivate(&self, board: &Board, username: &Username) -> SyncResult<()> {
        let body = serde_json::json!({ "isActive": false });
        self.send_json(
            reqwest::Method::PUT,
            &Self::member_path(board, username),
            &body,
            "membership deactivation",
        )
        .await
    }

    async fn ensure_admin(&self, board: &Board, username: &Username) -> SyncResult<()> {
        let body = serde_json::json!({ "isActive": true, "isAdmin": true });
        self.send_json(
            reqwest::Method::PUT,
            &Self::member_path(board, username),
            &body,
            "admin assertion",
        )
        .await
    }
}
