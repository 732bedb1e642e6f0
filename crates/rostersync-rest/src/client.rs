//! Admin REST directory client.

use async_trait::async_trait;
use reqwest::{header::LOCATION, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::debug;

use rostersync_core::{SyncError, SyncResult};
use rostersync_directory::traits::{DirectoryMutation, DirectoryQuery};
use rostersync_directory::types::{
    ActualAccount, ClientHandle, ClientSettings, DesiredUser, RoleName, Username,
};

use crate::auth::{obtain_token, RestConfig};

/// Page size for user listing.
const USER_PAGE_SIZE: usize = 500;

/// Client id of the built-in self-service account console.
const SELF_SERVICE_CLIENT: &str = "account";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientRepresentation {
    id: String,
    client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoleRepresentation {
    id: String,
    name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRepresentation {
    #[serde(default)]
    id: Option<String>,
    username: String,
    enabled: bool,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, Vec<String>>,
}

impl From<UserRepresentation> for ActualAccount {
    fn from(rep: UserRepresentation) -> Self {
        ActualAccount {
            id: rep.id.unwrap_or_default(),
            username: Username::new(rep.username),
            enabled: rep.enabled,
            first_name: rep.first_name,
            last_name: rep.last_name,
            attributes: rep.attributes,
        }
    }
}

/// Directory adapter over the identity server's admin REST API.
pub struct RestDirectory {
    http: Client,
    base_url: String,
    realm: String,
    token: String,
}

impl RestDirectory {
    /// Build the HTTP client and authenticate.
    pub async fn connect(config: &RestConfig) -> SyncResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("rostersync/0.1")
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;
        let token = obtain_token(&http, config).await?;
        debug!(base_url = %config.base_url, realm = %config.realm, "authenticated against admin API");
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            realm: config.realm.clone(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/admin/realms/{}{}", self.base_url, self.realm, path)
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
    ) -> SyncResult<Response> {
        let response = self
            .http
            .request(method, self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| SyncError::remote(context, e))?;
        self.expect_success(response, context).await
    }

    /// Resolve one client role to its representation (id included).
    async fn role_rep(
        &self,
        client: &ClientHandle,
        role: &RoleName,
    ) -> SyncResult<RoleRepresentation> {
        let context = "role lookup";
        let path = format!("/clients/{}/roles/{}", client.id, role);
        let response = self
            .http
            .get(self.url(&path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SyncError::remote(context, e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SyncError::LookupMiss {
                resource: "role",
                name: role.to_string(),
            });
        }
        let response = self.expect_success(response, context).await?;
        response.json().await.map_err(|e| SyncError::remote(context, e))
    }

    async fn role_reps(
        &self,
        client: &ClientHandle,
        roles: &[RoleName],
    ) -> SyncResult<Vec<RoleRepresentation>> {
        let mut reps = Vec::with_capacity(roles.len());
        for role in roles {
            reps.push(self.role_rep(client, role).await?);
        }
        Ok(reps)
    }

    async fn resolve_client_rep(&self, client_id: &str) -> SyncResult<ClientRepresentation> {
        let path = format!("/clients?clientId={client_id}");
        let matches: Vec<ClientRepresentation> =
            self.get_json(&path, "client resolution").await?;
        matches
            .into_iter()
            .find(|c| c.client_id == client_id)
            .ok_or(SyncError::LookupMiss {
                resource: "client",
                name: client_id.to_string(),
            })
    }
}

#[async_trait]
impl DirectoryQuery for RestDirectory {
    async fn resolve_client(&self, client_id: &str) -> SyncResult<ClientHandle> {
        let rep = self.resolve_client_rep(client_id).await?;
        Ok(ClientHandle {
            id: rep.id,
            client_id: rep.client_id,
        })
    }

    async fn list_roles(&self, client: &ClientHandle) -> SyncResult<BTreeSet<RoleName>> {
        let path = format!("/clients/{}/roles", client.id);
        let reps: Vec<RoleRepresentation> = self.get_json(&path, "role listing").await?;
        Ok(reps.into_iter().map(|r| RoleName::from(r.name)).collect())
    }

    async fn list_users(&self) -> SyncResult<Vec<ActualAccount>> {
        let mut accounts = Vec::new();
        let mut first = 0;
        loop {
            let path = format!("/users?first={first}&max={USER_PAGE_SIZE}");
            let page: Vec<UserRepresentation> = self.get_json(&path, "user listing").await?;
            let fetched = page.len();
            accounts.extend(page.into_iter().map(ActualAccount::from));
            if fetched < USER_PAGE_SIZE {
                break;
            }
            first += USER_PAGE_SIZE;
        }
        Ok(accounts)
    }

    async fn list_user_roles(
        &self,
        client: &ClientHandle,
        user_id: &str,
    ) -> SyncResult<BTreeSet<RoleName>> {
        let path = format!("/users/{user_id}/role-mappings/clients/{}", client.id);
        let reps: Vec<RoleRepresentation> =
            self.get_json(&path, "user role listing").await?;
        Ok(reps.into_iter().map(|r| RoleName::from(r.name)).collect())
    }

    async fn list_composite_members(
        &self,
        client: &ClientHandle,
        role: &RoleName,
    ) -> SyncResult<BTreeSet<RoleName>> {
        let rep = self.role_rep(client, role).await?;
        let path = format!("/roles-by-id/{}/composites", rep.id);
        let members: Vec<RoleRepresentation> =
            self.get_json(&path, "composite member listing").await?;
        Ok(members.into_iter().map(|r| RoleName::from(r.name)).collect())
    }

    async fn list_self_service_roles(&self, user_id: &str) -> SyncResult<BTreeSet<RoleName>> {
        // The built-in self-service client may be absent on hardened realms.
        let account_client = match self.resolve_client_rep(SELF_SERVICE_CLIENT).await {
            Ok(rep) => rep,
            Err(SyncError::LookupMiss { .. }) => {
                debug!("no self-service client in realm, nothing to strip");
                return Ok(BTreeSet::new());
            }
            Err(err) => return Err(err),
        };
        let handle = ClientHandle {
            id: account_client.id,
            client_id: account_client.client_id,
        };
        self.list_user_roles(&handle, user_id).await
    }
}

#[async_trait]
impl DirectoryMutation for RestDirectory {
    async fn update_client_settings(
        &self,
        client: &ClientHandle,
        settings: &ClientSettings,
    ) -> SyncResult<()> {
        let body = serde_json::json!({
            "description": settings.description,
            "redirectUris": settings.redirect_uris,
            "webOrigins": settings.web_origins,
        });
        let path = format!("/clients/{}", client.id);
        self.send_json(reqwest::Method::PUT, &path, &body, "client settings update")
            .await?;
        Ok(())
    }

    async fn create_role(&self, client: &ClientHandle, role: &RoleName) -> SyncResult<()> {
        let body = serde_json::json!({ "name": role });
        let path = format!("/clients/{}/roles", client.id);
        self.send_json(reqwest::Method::POST, &path, &body, "role creation")
            .await?;
        Ok(())
    }

    async fn delete_role(&self, client: &ClientHandle, role: &RoleName) -> SyncResult<()> {
        let path = format!("/clients/{}/roles/{}", client.id, role);
        let response = self
            .http
            .delete(self.url(&path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SyncError::remote("role deletion", e))?;
        self.expect_success(response, "role deletion").await?;
        Ok(())
    }

    async fn create_user(&self, user: &DesiredUser) -> SyncResult<String> {
        let rep = UserRepresentation {
            id: None,
            username: user.username.as_str().to_string(),
            enabled: true,
            first_name: Some(user.first_name.clone()),
            last_name: Some(user.last_name.clone()),
            email: Some(user.username.as_str().to_string()),
            attributes: user.attribute_bag(),
        };
        let response = self
            .send_json(reqwest::Method::POST, "/users", &rep, "account creation")
            .await?;
        // The new account id only appears in the Location header.
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit('/').next())
            .map(String::from);
        location.ok_or_else(|| SyncError::Remote {
            context: "account creation".to_string(),
            message: "no Location header in create response".to_string(),
        })
    }

    async fn update_user(
        &self,
        user_id: &str,
        user: &DesiredUser,
        attributes: &BTreeMap<String, Vec<String>>,
    ) -> SyncResult<()> {
        let body = serde_json::json!({
            "firstName": user.first_name,
            "lastName": user.last_name,
            "attributes": attributes,
        });
        let path = format!("/users/{user_id}");
        self.send_json(reqwest::Method::PUT, &path, &body, "account update")
            .await?;
        Ok(())
    }

    async fn set_enabled(&self, user_id: &str, enabled: bool) -> SyncResult<()> {
        let body = serde_json::json!({ "enabled": enabled });
        let path = format!("/users/{user_id}");
        self.send_json(reqwest::Method::PUT, &path, &body, "account enable toggle")
            .await?;
        Ok(())
    }

    async fn add_user_roles(
        &self,
        client: &ClientHandle,
        user_id: &str,
        roles: &[RoleName],
    ) -> SyncResult<()> {
        let reps = self.role_reps(client, roles).await?;
        let path = format!("/users/{user_id}/role-mappings/clients/{}", client.id);
        self.send_json(reqwest::Method::POST, &path, &reps, "role assignment")
            .await?;
        Ok(())
    }

    async fn remove_user_roles(
        &self,
        client: &ClientHandle,
        user_id: &str,
        roles: &[RoleName],
    ) -> SyncResult<()> {
        let reps = self.role_reps(client, roles).await?;
        let path = format!("/users/{user_id}/role-mappings/clients/{}", client.id);
        self.send_json(reqwest::Method::DELETE, &path, &reps, "role removal")
            .await?;
        Ok(())
    }

    async fn remove_self_service_roles(
        &self,
        user_id: &str,
        roles: &[RoleName],
    ) -> SyncResult<()> {
        let account_client = self.resolve_client_rep(SELF_SERVICE_CLIENT).await?;
        let handle = ClientHandle {
            id: account_client.id,
            client_id: account_client.client_id,
        };
        self.remove_user_roles(&handle, user_id, roles).await
    }

    async fn add_composite_members(
        &self,
        client: &ClientHandle,
        role: &RoleName,
        members: &[RoleName],
    ) -> SyncResult<()> {
        let rep = self.role_rep(client, role).await?;
        let member_reps = self.role_reps(client, members).await?;
        let path = format!("/roles-by-id/{}/composites", rep.id);
        self.send_json(
            reqwest::Method::POST,
            &path,
            &member_reps,
            "composite member addition",
        )
        .await?;
        Ok(())
    }

    async fn remove_composite_members(
        &self,
        client: &ClientHandle,
        role: &RoleName,
        members: &[RoleName],
    ) -> SyncResult<()> {
        let rep = self.role_rep(client, role).await?;
        let member_reps = self.role_reps(client, members).await?;
        let path = format!("/roles-by-id/{}/composites", rep.id);
        self.send_json(
            reqwest::Method::DELETE,
            &path,
            &member_reps,
            "composite member removal",
        )
        .await?;
        Ok(())
    }
}
